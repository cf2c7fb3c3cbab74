mod diff;
mod hunks;
mod status;

pub use diff::{parse_diff, DiffFile, LineType};
pub use hunks::{find_hunk, hunk_actions};
pub use status::{
    content_sources, detect_base_branch_in, get_current_branch_in, get_repo_root_in,
    git_apply_hunk, git_diff_numstat, git_diff_raw, read_content, DiffMode, FileStat, FileStatus,
};
