use glob::{MatchOptions, Pattern};
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Paths to leave out of the diff feed.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    /// Invalid globs are skipped with a warning.
    pub fn new(globs: &[String]) -> Self {
        let patterns = globs
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .filter_map(|g| match Pattern::new(g) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(glob = g, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        ExcludeSet { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}
