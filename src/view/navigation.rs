use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Layout of the diff browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationView {
    List,
    Detail,
    Split,
}

/// Which pane a narrow viewport shows; remembered across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileView {
    #[default]
    List,
    Detail,
}

/// Inputs to [`resolve_navigation_view`].
#[derive(Debug, Clone, Copy)]
pub struct NavigationSignals<'a> {
    pub is_narrow_viewport: bool,
    pub has_diff_entries: bool,
    pub selected_diff_path: Option<&'a str>,
    pub mobile_view: MobileView,
}

pub fn resolve_navigation_view(signals: NavigationSignals<'_>) -> NavigationView {
    if !signals.is_narrow_viewport {
        return NavigationView::Split;
    }
    if !signals.has_diff_entries {
        return NavigationView::List;
    }
    match (signals.mobile_view, signals.selected_diff_path) {
        (MobileView::Detail, Some(path)) if !path.is_empty() => NavigationView::Detail,
        _ => NavigationView::List,
    }
}

// ── Persisted UI state ──

const STATE_FILE: &str = "ui-state.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiState {
    #[serde(default)]
    pub mobile_view: MobileView,
}

/// `<state dir>/hr/ui-state.json`, falling back to the local data dir on
/// platforms without a state dir.
pub fn default_state_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("hr").join(STATE_FILE))
}

impl UiState {
    /// Missing or unreadable state yields defaults.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return UiState::default();
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring invalid ui state");
                UiState::default()
            }
        }
    }

    /// Write atomically through a temp file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}
