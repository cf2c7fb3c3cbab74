//! Stateless view-selection rules shared by every pane.

mod navigation;
mod panel;

pub use navigation::{
    default_state_path, resolve_navigation_view, MobileView, NavigationSignals, NavigationView,
    UiState,
};
pub use panel::{resolve_panel_view, PanelSignals, PanelView};
