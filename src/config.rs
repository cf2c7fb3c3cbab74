use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LOCAL_CONFIG_FILE: &str = ".hr-config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrConfig {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub hunks: HunksConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub wrap_lines: bool,
    #[serde(default = "default_true")]
    pub line_numbers: bool,
    #[serde(default = "default_tab_width")]
    pub tab_width: u8,
    /// A syntect default theme name
    #[serde(default = "default_theme")]
    pub theme: String,
}

/// [layout] section: when the browser collapses to one pane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Terminals narrower than this many columns show list or detail, not both
    #[serde(default = "default_narrow_width")]
    pub narrow_width: u16,
    #[serde(default = "default_list_width")]
    pub list_width: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Files per page; further pages load on demand
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Glob patterns for paths to leave out of the diff list
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HunksConfig {
    /// Show Stage / Unstage / Discard rows inside the file view
    #[serde(default = "default_true")]
    pub actions: bool,
}

fn default_true() -> bool {
    true
}

fn default_tab_width() -> u8 {
    4
}

fn default_theme() -> String {
    "base16-ocean.dark".into()
}

fn default_narrow_width() -> u16 {
    100
}

fn default_list_width() -> u16 {
    36
}

fn default_page_size() -> usize {
    50
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            wrap_lines: false,
            line_numbers: true,
            tab_width: default_tab_width(),
            theme: default_theme(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            narrow_width: default_narrow_width(),
            list_width: default_list_width(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            debounce_ms: default_debounce_ms(),
            exclude: Vec::new(),
        }
    }
}

impl Default for HunksConfig {
    fn default() -> Self {
        Self { actions: true }
    }
}

/// `~/.config/hr/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hr").join("config.toml"))
}

/// Load config by merging global defaults with per-repo overrides.
/// Priority: per-repo `.hr-config.toml` > global `~/.config/hr/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections override independently.
pub fn load_config(repo_root: &str) -> HrConfig {
    let local_path = Path::new(repo_root).join(LOCAL_CONFIG_FILE);
    load_config_from(global_config_path().as_deref(), &local_path)
}

pub fn load_config_from(global_path: Option<&Path>, local_path: &Path) -> HrConfig {
    let global_table = global_path.and_then(read_table);
    let local_table = read_table(local_path);

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            global
        }
        (Some(global), None) => global,
        (None, Some(local)) => local,
        (None, None) => return HrConfig::default(),
    };

    match toml::Value::Table(merged).try_into() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config has invalid values, using defaults");
            HrConfig::default()
        }
    }
}

fn read_table(path: &Path) -> Option<toml::Table> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Table>(&content) {
        Ok(table) => Some(table),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unparsable config");
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// The effective configuration as TOML, for `--print-config`.
pub fn render_config(config: &HrConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
