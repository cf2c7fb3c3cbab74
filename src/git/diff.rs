use super::status::{FileStatus, PatchSides};

/// A single line in a diff hunk
#[derive(Debug, Clone, PartialEq)]
pub struct DiffLine {
    pub line_type: LineType,
    pub content: String,
    pub old_num: Option<usize>,
    pub new_num: Option<usize>,
    /// Followed by "\ No newline at end of file".
    pub missing_newline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    Context,
    Add,
    Delete,
}

impl LineType {
    pub fn prefix(self) -> char {
        match self {
            LineType::Context => ' ',
            LineType::Add => '+',
            LineType::Delete => '-',
        }
    }
}

/// A diff hunk with header and lines
#[derive(Debug, Clone, PartialEq)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// (additions, deletions) inside this hunk.
    pub fn change_counts(&self) -> (usize, usize) {
        self.lines.iter().fold((0, 0), |(adds, dels), line| match line.line_type {
            LineType::Add => (adds + 1, dels),
            LineType::Delete => (adds, dels + 1),
            LineType::Context => (adds, dels),
        })
    }

    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.line_type != LineType::Context)
    }
}

/// A file with its diff hunks and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DiffFile {
    pub path: String,
    pub status: FileStatus,
    pub hunks: Vec<DiffHunk>,
    pub adds: usize,
    pub dels: usize,
    pub binary: bool,
    /// Mode from a `new file mode` / `deleted file mode` header.
    pub file_mode: Option<String>,
}

impl DiffFile {
    fn new(path: String) -> Self {
        DiffFile {
            path,
            status: FileStatus::Modified, // refined by the extended headers
            hunks: Vec::new(),
            adds: 0,
            dels: 0,
            binary: false,
            file_mode: None,
        }
    }

    /// Path of the "before" side when it differs from `path`.
    pub fn original_path(&self) -> Option<&str> {
        match &self.status {
            FileStatus::Renamed(old) | FileStatus::Copied(old) => Some(old),
            _ => None,
        }
    }

    /// Headers a single-hunk patch of this file needs.
    pub fn patch_sides(&self) -> PatchSides {
        let mode = || self.file_mode.clone().unwrap_or_else(|| "100644".to_string());
        match self.status {
            FileStatus::Added => PatchSides::Created { mode: mode() },
            FileStatus::Deleted => PatchSides::Deleted { mode: mode() },
            _ => PatchSides::Modified,
        }
    }
}

/// Parse unified diff output into structured data
pub fn parse_diff(raw: &str) -> Vec<DiffFile> {
    let mut files: Vec<DiffFile> = Vec::new();
    let mut current_file: Option<DiffFile> = None;
    let mut current_hunk: Option<DiffHunk> = None;
    let mut old_line: usize = 0;
    let mut new_line: usize = 0;

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);

        // New file header: diff --git a/path b/path
        if line.starts_with("diff --git") {
            flush_hunk(&mut current_file, &mut current_hunk);
            if let Some(file) = current_file.take() {
                files.push(file);
            }

            let path = line.split(" b/").last().unwrap_or("").to_string();
            current_file = Some(DiffFile::new(path));
            continue;
        }

        // Extended headers only appear before the first hunk of a file
        if current_hunk.is_none() {
            if let Some(ref mut file) = current_file {
                if let Some(rest) = line.strip_prefix("new file") {
                    file.status = FileStatus::Added;
                    file.file_mode = header_mode(rest);
                    continue;
                }
                if let Some(rest) = line.strip_prefix("deleted file") {
                    file.status = FileStatus::Deleted;
                    file.file_mode = header_mode(rest);
                    continue;
                }
                if let Some(old_path) = line.strip_prefix("rename from ") {
                    file.status = FileStatus::Renamed(old_path.to_string());
                    continue;
                }
                if let Some(old_path) = line.strip_prefix("copy from ") {
                    file.status = FileStatus::Copied(old_path.to_string());
                    continue;
                }
                if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
                    file.binary = true;
                    continue;
                }
                if line.starts_with("index ")
                    || line.starts_with("--- ")
                    || line.starts_with("+++ ")
                    || line.starts_with("similarity index")
                    || line.starts_with("dissimilarity index")
                    || line.starts_with("rename to")
                    || line.starts_with("copy to")
                    || line.starts_with("old mode")
                    || line.starts_with("new mode")
                {
                    continue;
                }
            }
        }

        // Hunk header: @@ -old_start,old_count +new_start,new_count @@ context
        if line.starts_with("@@") {
            flush_hunk(&mut current_file, &mut current_hunk);
            if let Some(parsed) = parse_hunk_header(line) {
                old_line = parsed.old_start;
                new_line = parsed.new_start;
                current_hunk = Some(parsed);
            }
            continue;
        }

        let Some(ref mut hunk) = current_hunk else {
            continue;
        };

        if line.starts_with('\\') {
            if let Some(last) = hunk.lines.last_mut() {
                last.missing_newline = true;
            }
            continue;
        }

        let (line_type, content) = match line.chars().next() {
            Some('+') => (LineType::Add, &line[1..]),
            Some('-') => (LineType::Delete, &line[1..]),
            Some(' ') => (LineType::Context, &line[1..]),
            None => (LineType::Context, ""),
            Some(_) => continue,
        };

        let (old_num, new_num) = match line_type {
            LineType::Add => {
                new_line += 1;
                (None, Some(new_line - 1))
            }
            LineType::Delete => {
                old_line += 1;
                (Some(old_line - 1), None)
            }
            LineType::Context => {
                old_line += 1;
                new_line += 1;
                (Some(old_line - 1), Some(new_line - 1))
            }
        };

        if let Some(ref mut file) = current_file {
            match line_type {
                LineType::Add => file.adds += 1,
                LineType::Delete => file.dels += 1,
                LineType::Context => {}
            }
        }

        hunk.lines.push(DiffLine {
            line_type,
            content: content.to_string(),
            old_num,
            new_num,
            missing_newline: false,
        });
    }

    flush_hunk(&mut current_file, &mut current_hunk);
    if let Some(file) = current_file {
        files.push(file);
    }

    files
}

/// "` mode 100755`" → "100755"
fn header_mode(rest: &str) -> Option<String> {
    rest.trim()
        .strip_prefix("mode ")
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn flush_hunk(file: &mut Option<DiffFile>, hunk: &mut Option<DiffHunk>) {
    if let Some(hunk) = hunk.take() {
        if let Some(file) = file.as_mut() {
            file.hunks.push(hunk);
        }
    }
}

/// Parse a hunk header like "@@ -10,4 +10,15 @@ fn foo()"
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let after_first = line.strip_prefix("@@ ")?;
    let end_idx = after_first.find(" @@")?;
    let range_str = &after_first[..end_idx];
    let context = after_first[end_idx + 3..].trim().to_string();

    // "-old_start,old_count +new_start,new_count"
    let parts: Vec<&str> = range_str.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let (old_start, old_count) = parse_range(parts[0].strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(parts[1].strip_prefix('+')?)?;

    let header = if context.is_empty() {
        format!("@@ -{},{} +{},{} @@", old_start, old_count, new_start, new_count)
    } else {
        format!(
            "@@ -{},{} +{},{} @@ {}",
            old_start, old_count, new_start, new_count, context
        )
    };

    Some(DiffHunk {
        header,
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}
