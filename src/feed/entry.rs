use anyhow::Result;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::engine::{DiffRequest, HunkAction};
use crate::git::{self, DiffFile, DiffMode};

/// One file of the diff list, with both sides' full text.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub file: String,
    pub additions: usize,
    pub deletions: usize,
    pub before: String,
    pub after: String,
    /// Parsed patch for this file
    pub diff: Option<DiffFile>,
    /// `{ status, originalPath, binary, hunks }`
    pub meta: Option<serde_json::Value>,
}

impl DiffEntry {
    pub fn original_path(&self) -> Option<&str> {
        self.diff.as_ref().and_then(DiffFile::original_path)
    }

    pub fn status_symbol(&self) -> &'static str {
        self.diff.as_ref().map_or("~", |d| d.status.symbol())
    }

    /// What the editor needs to show this entry.
    pub fn to_request(&self) -> DiffRequest {
        DiffRequest {
            path: self.file.clone(),
            original_text: self.before.clone(),
            modified_text: self.after.clone(),
            original_path: self.original_path().map(str::to_string),
        }
    }

    pub fn hunk_actions(&self, mode: DiffMode) -> Vec<HunkAction> {
        self.diff
            .as_ref()
            .map(|d| git::hunk_actions(d, mode))
            .unwrap_or_default()
    }
}

/// Read both sides of `file` and wrap it as an entry.
pub fn build_entry(repo_root: &str, mode: DiffMode, base: &str, file: DiffFile) -> Result<DiffEntry> {
    let (before, after) = if file.binary {
        (String::new(), String::new())
    } else {
        let (before_src, after_src) = git::content_sources(mode, base, &file.status);
        let before_path = file.original_path().unwrap_or(&file.path);
        (
            git::read_content(repo_root, before_path, &before_src)?,
            git::read_content(repo_root, &file.path, &after_src)?,
        )
    };

    Ok(DiffEntry {
        file: file.path.clone(),
        additions: file.adds,
        deletions: file.dels,
        before,
        after,
        meta: Some(entry_meta(&file)),
        diff: Some(file),
    })
}

fn entry_meta(file: &DiffFile) -> serde_json::Value {
    json!({
        "status": file.status.label(),
        "originalPath": file.original_path(),
        "binary": file.binary,
        "hunks": file.hunks.len(),
    })
}

/// SHA-256 over everything that determines the entry list.
pub fn fingerprint(mode: DiffMode, base: &str, raw_diff: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mode.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(base.as_bytes());
    hasher.update([0u8]);
    hasher.update(raw_diff.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::parse_diff;

    const RENAME: &str = "diff --git a/old.py b/new.rs\n\
                          similarity index 80%\n\
                          rename from old.py\n\
                          rename to new.rs\n\
                          --- a/old.py\n\
                          +++ b/new.rs\n\
                          @@ -1 +1 @@\n\
                          -a\n\
                          +b\n";

    fn entry_from(raw: &str) -> DiffEntry {
        let file = parse_diff(raw).remove(0);
        DiffEntry {
            file: file.path.clone(),
            additions: file.adds,
            deletions: file.dels,
            before: "a\n".into(),
            after: "b\n".into(),
            meta: Some(entry_meta(&file)),
            diff: Some(file),
        }
    }

    #[test]
    fn request_carries_original_path_for_renames() {
        let entry = entry_from(RENAME);
        let request = entry.to_request();
        assert_eq!(request.path, "new.rs");
        assert_eq!(request.original_path.as_deref(), Some("old.py"));
        assert_eq!(request.original_text, "a\n");
        assert_eq!(entry.status_symbol(), "R");
    }

    #[test]
    fn meta_describes_the_file() {
        let entry = entry_from(RENAME);
        let meta = entry.meta.unwrap();
        assert_eq!(meta["status"], "renamed");
        assert_eq!(meta["originalPath"], "old.py");
        assert_eq!(meta["hunks"], 1);
    }

    #[test]
    fn hunk_actions_of_entry_without_diff_are_empty() {
        let mut entry = entry_from(RENAME);
        entry.diff = None;
        assert!(entry.hunk_actions(DiffMode::Unstaged).is_empty());
        assert_eq!(entry.original_path(), None);
    }

    #[test]
    fn fingerprint_depends_on_mode_base_and_diff() {
        let a = fingerprint(DiffMode::Unstaged, "", "x");
        assert_eq!(a, fingerprint(DiffMode::Unstaged, "", "x"));
        assert_ne!(a, fingerprint(DiffMode::Staged, "", "x"));
        assert_ne!(a, fingerprint(DiffMode::Unstaged, "main", "x"));
        assert_ne!(a, fingerprint(DiffMode::Unstaged, "", "y"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn binary_entries_skip_content() {
        let raw = "diff --git a/logo.png b/logo.png\n\
                   Binary files a/logo.png and b/logo.png differ\n";
        let file = parse_diff(raw).remove(0);
        let entry = build_entry("/nonexistent", DiffMode::Unstaged, "", file).unwrap();
        assert!(entry.before.is_empty() && entry.after.is_empty());
        assert_eq!(entry.meta.unwrap()["binary"], true);
    }
}
