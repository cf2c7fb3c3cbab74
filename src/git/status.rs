use super::diff::DiffHunk;
use crate::engine::HunkActionKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// File change status in git
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed(String), // old path
    Copied(String),  // source path
}

impl FileStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            FileStatus::Added => "+",
            FileStatus::Modified => "~",
            FileStatus::Deleted => "-",
            FileStatus::Renamed(_) => "R",
            FileStatus::Copied(_) => "C",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed(_) => "renamed",
            FileStatus::Copied(_) => "copied",
        }
    }
}

/// Which pair of trees is being compared.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// Index → working tree
    #[default]
    Unstaged,
    /// HEAD → index
    Staged,
    /// Base branch → working tree
    Branch,
}

impl DiffMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffMode::Unstaged => "unstaged",
            DiffMode::Staged => "staged",
            DiffMode::Branch => "branch",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DiffMode::Unstaged => "UNSTAGED",
            DiffMode::Staged => "STAGED",
            DiffMode::Branch => "BRANCH",
        }
    }

    /// Branch diffs span commits; nothing there can be staged or discarded.
    pub fn read_only(self) -> bool {
        self == DiffMode::Branch
    }

    pub fn offers(self, kind: HunkActionKind) -> bool {
        matches!(
            (self, kind),
            (DiffMode::Unstaged, HunkActionKind::Stage)
                | (DiffMode::Unstaged, HunkActionKind::Discard)
                | (DiffMode::Staged, HunkActionKind::Unstage)
        )
    }
}

// ── Repo Info ──

/// Get the repository root directory for a specific path
pub fn get_repo_root_in(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .with_context(|| format!("Failed to run git in '{}'", dir.display()))?;

    if !output.status.success() {
        anyhow::bail!("Not a git repository: {}", dir.display());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Get current branch for a specific repo root
pub fn get_current_branch_in(repo_root: &str) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(repo_root)
        .output()
        .context("Failed to get current branch")?;

    if !output.status.success() {
        anyhow::bail!("Failed to determine current branch");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Auto-detect the base branch by checking upstream tracking, then falling
/// back to common names (main, master, develop).
pub fn detect_base_branch_in(repo_root: &str) -> Result<String> {
    let run = |args: &[&str]| -> Option<String> {
        let out = Command::new("git")
            .args(args)
            .current_dir(repo_root)
            .output()
            .ok()?;
        if out.status.success() {
            Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
        } else {
            None
        }
    };

    let current = run(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();

    // Upstream tracking branch
    if let Some(upstream) = run(&["rev-parse", "--abbrev-ref", "@{upstream}"]) {
        if let Some(branch) = upstream.rsplit('/').next() {
            if branch != current && !branch.is_empty() {
                if run(&["rev-parse", "--verify", branch]).is_some() {
                    return Ok(branch.to_string());
                }
                if run(&["rev-parse", "--verify", &upstream]).is_some() {
                    return Ok(upstream);
                }
            }
        }
    }

    for candidate in ["main", "master", "develop", "dev"] {
        if candidate != current && run(&["rev-parse", "--verify", candidate]).is_some() {
            return Ok(candidate.to_string());
        }
    }

    for candidate in ["origin/main", "origin/master", "origin/develop"] {
        if run(&["rev-parse", "--verify", candidate]).is_some() {
            return Ok(candidate.to_string());
        }
    }

    Ok("main".to_string())
}

// ── Diff ──

const DIFF_FLAGS: [&str; 3] = ["--unified=3", "--no-color", "--no-ext-diff"];

/// `git diff` arguments for a mode, with an optional output format flag
/// (e.g. `--numstat`).
fn diff_args<'a>(mode: DiffMode, base: &'a str, format: Option<&'a str>) -> Vec<&'a str> {
    let mut args = vec!["diff"];
    match mode {
        DiffMode::Unstaged => {}
        DiffMode::Staged => args.push("--staged"),
        DiffMode::Branch => args.push(base),
    }
    args.extend(DIFF_FLAGS);
    args.extend(format);
    args
}

fn run_diff(args: &[&str], repo_root: &str) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .context("Failed to run git diff")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git diff failed: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Get the raw diff output from git for a given mode
pub fn git_diff_raw(mode: DiffMode, base: &str, repo_root: &str) -> Result<String> {
    run_diff(&diff_args(mode, base, None), repo_root)
}

/// Per-file line counts from `git diff --numstat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    pub binary: bool,
}

pub fn git_diff_numstat(mode: DiffMode, base: &str, repo_root: &str) -> Result<Vec<FileStat>> {
    let raw = run_diff(&diff_args(mode, base, Some("--numstat")), repo_root)?;
    Ok(parse_numstat(&raw))
}

/// Parse `adds<TAB>dels<TAB>path` lines; binary files report `-` counts.
pub fn parse_numstat(raw: &str) -> Vec<FileStat> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let adds = parts.next()?;
            let dels = parts.next()?;
            let path = parts.next()?.trim();
            if path.is_empty() {
                return None;
            }
            let binary = adds == "-" && dels == "-";
            Some(FileStat {
                path: path.to_string(),
                additions: adds.parse().unwrap_or(0),
                deletions: dels.parse().unwrap_or(0),
                binary,
            })
        })
        .collect()
}

// ── Content ──

/// Where one side of a diff is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Worktree,
    Index,
    Rev(String),
    /// The side does not exist (added or deleted file).
    Absent,
}

/// (before, after) sources for a file under `mode`.
pub fn content_sources(
    mode: DiffMode,
    base: &str,
    status: &FileStatus,
) -> (ContentSource, ContentSource) {
    let before = match (status, mode) {
        (FileStatus::Added, _) => ContentSource::Absent,
        (_, DiffMode::Unstaged) => ContentSource::Index,
        (_, DiffMode::Staged) => ContentSource::Rev("HEAD".into()),
        (_, DiffMode::Branch) => ContentSource::Rev(base.to_string()),
    };
    let after = match (status, mode) {
        (FileStatus::Deleted, _) => ContentSource::Absent,
        (_, DiffMode::Staged) => ContentSource::Index,
        (_, DiffMode::Unstaged | DiffMode::Branch) => ContentSource::Worktree,
    };
    (before, after)
}

/// Read a file's text from `source`. Missing content reads as empty.
pub fn read_content(repo_root: &str, path: &str, source: &ContentSource) -> Result<String> {
    let object = match source {
        ContentSource::Absent => return Ok(String::new()),
        ContentSource::Worktree => {
            let full = Path::new(repo_root).join(path);
            return match std::fs::read(&full) {
                Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(e).with_context(|| format!("Failed to read {}", full.display())),
            };
        }
        ContentSource::Index => format!(":{}", path),
        ContentSource::Rev(rev) => format!("{}:{}", rev, path),
    };

    let output = Command::new("git")
        .args(["show", &object])
        .current_dir(repo_root)
        .output()
        .context("Failed to run git show")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git show {} failed: {}", object, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ── Hunk actions ──

/// How a reconstructed patch names the two sides of its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSides {
    /// Both sides exist under the same path.
    Modified,
    /// Only the new side exists.
    Created { mode: String },
    /// Only the old side exists.
    Deleted { mode: String },
}

/// `git apply` arguments for one hunk action.
pub fn apply_args(kind: HunkActionKind) -> &'static [&'static str] {
    match kind {
        HunkActionKind::Stage => &["apply", "--cached", "--unidiff-zero"],
        HunkActionKind::Unstage => &["apply", "--cached", "--reverse", "--unidiff-zero"],
        HunkActionKind::Discard => &["apply", "--reverse", "--unidiff-zero"],
    }
}

/// Relative, inside the repository, no parent traversal.
pub fn is_safe_repo_rel_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\0')
        && !path.split(['/', '\\']).any(|part| part == "..")
}

/// Apply one hunk to the index or the working tree by reconstructing a patch
/// and piping it to `git apply`.
pub fn git_apply_hunk(
    repo_root: &str,
    file_path: &str,
    sides: &PatchSides,
    hunk: &DiffHunk,
    kind: HunkActionKind,
) -> Result<()> {
    if !is_safe_repo_rel_path(file_path) {
        anyhow::bail!("Refusing to patch path outside the repository: {}", file_path);
    }
    let patch = reconstruct_hunk_patch(file_path, sides, hunk);

    let mut child = Command::new("git")
        .args(apply_args(kind))
        .current_dir(repo_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn git apply")?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(patch.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Failed to {} hunk: {}", kind.label().to_lowercase(), stderr.trim());
    }

    Ok(())
}

/// Reconstruct a minimal unified diff patch from a single DiffHunk.
/// Created and deleted files get `/dev/null` on their missing side so the
/// index entry itself is added or removed.
fn reconstruct_hunk_patch(file_path: &str, sides: &PatchSides, hunk: &DiffHunk) -> String {
    let old_side = format!("a/{}", file_path);
    let new_side = format!("b/{}", file_path);
    let mut patch = String::new();
    patch.push_str(&format!("diff --git {} {}\n", old_side, new_side));
    let (old_side, new_side) = match sides {
        PatchSides::Modified => (old_side.as_str(), new_side.as_str()),
        PatchSides::Created { mode } => {
            patch.push_str(&format!("new file mode {}\n", mode));
            ("/dev/null", new_side.as_str())
        }
        PatchSides::Deleted { mode } => {
            patch.push_str(&format!("deleted file mode {}\n", mode));
            (old_side.as_str(), "/dev/null")
        }
    };
    patch.push_str(&format!("--- {}\n", old_side));
    patch.push_str(&format!("+++ {}\n", new_side));
    patch.push_str(&hunk.header);
    patch.push('\n');

    for line in &hunk.lines {
        patch.push(line.line_type.prefix());
        patch.push_str(&line.content);
        patch.push('\n');
        if line.missing_newline {
            patch.push_str("\\ No newline at end of file\n");
        }
    }

    patch
}
