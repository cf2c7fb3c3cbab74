/// Coarse display state of the diff list panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelView {
    Loading,
    Error,
    Empty,
    List,
}

/// Inputs to [`resolve_panel_view`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelSignals<'a> {
    pub loading: bool,
    pub error: Option<&'a str>,
    pub diff_count: usize,
    pub diff_loaded: bool,
    pub has_summary_changes: bool,
}

/// Checks run in a fixed order: loading, error, entries, then a summary that
/// promises changes not yet fetched.
pub fn resolve_panel_view(signals: PanelSignals<'_>) -> PanelView {
    if signals.loading {
        return PanelView::Loading;
    }
    if signals.error.is_some() {
        return PanelView::Error;
    }
    if signals.diff_count > 0 {
        return PanelView::List;
    }
    if signals.has_summary_changes && !signals.diff_loaded {
        return PanelView::Loading;
    }
    PanelView::Empty
}
