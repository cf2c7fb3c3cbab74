use super::diff::{DiffFile, DiffHunk, LineType};
use super::status::{DiffMode, FileStatus};
use crate::engine::{HunkAction, HunkActionKind};

/// Hunk ids are 1-based positions in the file: "1", "2", …
pub fn hunk_id(index: usize) -> String {
    (index + 1).to_string()
}

pub fn find_hunk<'a>(file: &'a DiffFile, id: &str) -> Option<&'a DiffHunk> {
    let index = id.parse::<usize>().ok()?.checked_sub(1)?;
    file.hunks.get(index)
}

/// New-file line of the first changed line, counting context from
/// `max(1, new_start)`. A hunk without changes anchors at its start.
pub fn hunk_anchor_line(hunk: &DiffHunk) -> usize {
    let mut new_line = hunk.new_start.max(1);
    for line in &hunk.lines {
        match line.line_type {
            LineType::Context => new_line += 1,
            LineType::Add | LineType::Delete => return new_line,
        }
    }

    if hunk.new_start > 0 {
        hunk.new_start
    } else {
        hunk.old_start.max(1)
    }
}

/// Overlay metadata for every hunk of `file` under `mode`.
pub fn hunk_actions(file: &DiffFile, mode: DiffMode) -> Vec<HunkAction> {
    // A single-path patch can't express a rename or copy, and an
    // intent-to-add entry can't take a file-creation patch
    let path_bound = match file.status {
        FileStatus::Renamed(_) | FileStatus::Copied(_) => true,
        FileStatus::Added => mode == DiffMode::Unstaged,
        FileStatus::Modified | FileStatus::Deleted => false,
    };

    file.hunks
        .iter()
        .enumerate()
        .map(|(index, hunk)| {
            let (additions, deletions) = hunk.change_counts();
            HunkAction {
                id: hunk_id(index),
                anchor_line: i64::try_from(hunk_anchor_line(hunk)).ok(),
                old_start: hunk.old_start,
                old_count: hunk.old_count,
                new_start: hunk.new_start,
                new_count: hunk.new_count,
                additions,
                deletions,
                stage_enabled: mode.offers(HunkActionKind::Stage),
                unstage_enabled: mode.offers(HunkActionKind::Unstage),
                discard_enabled: mode.offers(HunkActionKind::Discard),
                disabled: path_bound || file.binary || !hunk.has_changes(),
            }
        })
        .collect()
}
