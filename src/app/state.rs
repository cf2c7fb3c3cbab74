use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::surface::EditorSurface;
use crate::config::{self, HrConfig};
use crate::engine::runtime::{acquire_highlight_runtime, HighlightRuntime};
use crate::engine::{
    DiffEditor, HunkActionKind, HunkActionRequest, HunkActionState, InitStatus, InitTicket,
    OverlayZone, Readiness, TextBuffer,
};
use crate::feed::{DiffEntry, DiffFeed};
use crate::git::{self, DiffMode};
use crate::view::{
    default_state_path, resolve_navigation_view, MobileView, NavigationSignals, NavigationView,
    UiState,
};
use crate::watch::{Subscription, SubscriptionKey, WatchEvent};

/// Lines kept above a focused zone when scrolling to it.
const ZONE_SCROLL_MARGIN: usize = 3;

/// Ticks a notification stays on screen (~2s at 100ms per tick).
const MESSAGE_TICKS: u8 = 20;

/// How the app was started.
#[derive(Debug, Clone)]
pub struct Options {
    pub path: PathBuf,
    pub mode: DiffMode,
    /// Base ref for branch mode; auto-detected when absent
    pub base: Option<String>,
    pub watch: bool,
}

/// Result of a hunk action thread.
#[derive(Debug)]
struct ActionResult {
    request: HunkActionRequest,
    path: String,
    outcome: std::result::Result<(), String>,
}

// ── Main App State ──

pub struct App {
    pub repo_root: String,
    /// Checked-out branch, for the top bar
    pub branch: String,
    pub config: HrConfig,
    pub feed: DiffFeed,
    pub editor: DiffEditor<EditorSurface>,

    /// Claim on the highlighting runtime until it settles
    runtime_ticket: Option<InitTicket<HighlightRuntime>>,
    pub runtime: Option<Arc<HighlightRuntime>>,

    /// Index of the selected entry in the feed
    pub selected: usize,
    selected_path: Option<String>,

    pub mobile_view: MobileView,
    state_path: Option<PathBuf>,

    /// Hunk id of the zone the action keys apply to
    pub focused_hunk: Option<String>,
    /// First buffer line shown in the detail pane (0-based)
    pub scroll: usize,
    pub show_original: bool,
    pub viewport_width: u16,

    pub should_quit: bool,

    /// Last notification and how long it has been shown
    pub message: Option<String>,
    pub message_ticks: u8,

    action_tx: mpsc::Sender<ActionResult>,
    action_rx: mpsc::Receiver<ActionResult>,

    pub watching: bool,
    subscription: Subscription,
    watch_tx: mpsc::Sender<WatchEvent>,
    watch_rx: mpsc::Receiver<WatchEvent>,

    /// `--base`, kept for switching into branch mode later
    cli_base: Option<String>,
}

impl App {
    pub fn new(options: Options) -> Result<Self> {
        let dir = std::fs::canonicalize(&options.path)
            .with_context(|| format!("Path not found: {}", options.path.display()))?;
        let repo_root = git::get_repo_root_in(&dir)?;
        let config = config::load_config(&repo_root);
        let state_path = default_state_path();

        let mut app = App::assemble(repo_root, config, options.mode, options.base, state_path);
        app.watching = options.watch;
        app.branch = git::get_current_branch_in(&app.repo_root).unwrap_or_else(|e| {
            debug!(error = %e, "no current branch");
            String::new()
        });

        app.runtime_ticket = Some(acquire_highlight_runtime(&app.config.display.theme));
        app.feed.refresh();
        app.subscribe();
        info!(
            root = %app.repo_root,
            mode = app.feed.mode().as_str(),
            base = app.feed.base(),
            "review started"
        );
        Ok(app)
    }

    /// Build the state without starting any background work.
    pub(crate) fn assemble(
        repo_root: String,
        config: HrConfig,
        mode: DiffMode,
        cli_base: Option<String>,
        state_path: Option<PathBuf>,
    ) -> Self {
        let base = base_for(&repo_root, mode, cli_base.as_deref());
        let feed = DiffFeed::new(&repo_root, mode, &base, &config.feed);

        let mut editor = DiffEditor::new(EditorSurface::default(), config.hunks.actions);
        editor.set_wrap(config.display.wrap_lines);
        editor.set_read_only(mode.read_only());

        let mobile_view = state_path
            .as_deref()
            .map(UiState::load)
            .unwrap_or_default()
            .mobile_view;

        let (action_tx, action_rx) = mpsc::channel();
        let (watch_tx, watch_rx) = mpsc::channel();

        App {
            repo_root,
            branch: String::new(),
            config,
            feed,
            editor,
            runtime_ticket: None,
            runtime: None,
            selected: 0,
            selected_path: None,
            mobile_view,
            state_path,
            focused_hunk: None,
            scroll: 0,
            show_original: false,
            viewport_width: u16::MAX,
            should_quit: false,
            message: None,
            message_ticks: 0,
            action_tx,
            action_rx,
            watching: false,
            subscription: Subscription::default(),
            watch_tx,
            watch_rx,
            cli_base,
        }
    }

    // ── Accessors ──

    pub fn mode(&self) -> DiffMode {
        self.feed.mode()
    }

    pub fn selected_entry(&self) -> Option<&DiffEntry> {
        self.feed.entries().get(self.selected)
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selected_path.as_deref()
    }

    /// Buffer the detail pane shows.
    pub fn shown_buffer(&self) -> Option<&TextBuffer> {
        if self.show_original {
            self.editor.original()
        } else {
            self.editor.modified()
        }
    }

    pub fn is_narrow(&self) -> bool {
        self.viewport_width < self.config.layout.narrow_width
    }

    pub fn navigation_view(&self) -> NavigationView {
        resolve_navigation_view(NavigationSignals {
            is_narrow_viewport: self.is_narrow(),
            has_diff_entries: !self.feed.entries().is_empty(),
            selected_diff_path: self.selected_path.as_deref(),
            mobile_view: self.mobile_view,
        })
    }

    pub fn focused_zone(&self) -> Option<&OverlayZone> {
        let id = self.focused_hunk.as_deref()?;
        self.editor.zones().iter().find(|z| z.hunk_id == id)
    }

    pub fn set_viewport_width(&mut self, width: u16) {
        self.viewport_width = width;
    }

    // ── Event loop ──

    /// One scheduling tick: take in everything that arrived from background
    /// work, then let the editor run its deferred work.
    pub fn tick(&mut self) {
        self.poll_runtime();
        self.poll_watch();
        if self.feed.poll() {
            self.reconcile_selection();
        }
        if let Some(error) = self.feed.take_page_error() {
            self.notify(&format!("Failed to load more files: {}", error));
        }
        self.poll_actions();
        self.editor.flush();
        self.age_message();
    }

    fn poll_runtime(&mut self) {
        let Some(ticket) = self.runtime_ticket.as_mut() else {
            return;
        };
        match ticket.poll() {
            InitStatus::Pending => {}
            InitStatus::Ready(runtime) => {
                debug!(theme = runtime.theme_name(), "highlight runtime ready");
                self.runtime = Some(runtime);
                self.runtime_ticket = None;
                self.editor.mark_ready();
            }
            InitStatus::Failed(err) => {
                warn!(error = %err, "highlight runtime failed to load");
                self.runtime_ticket = None;
                self.editor.mark_failed(err);
            }
        }
    }

    fn poll_watch(&mut self) {
        let mut changed = false;
        while let Ok(event) = self.watch_rx.try_recv() {
            if !self.subscription.is_current(&event) {
                debug!(subscription = event.subscription(), "dropping event from old watcher");
                continue;
            }
            match event {
                WatchEvent::FilesChanged { paths, .. } => {
                    debug!(count = paths.len(), "files changed");
                    changed = true;
                }
                WatchEvent::Error { message, .. } => {
                    self.notify(&format!("Watcher error: {}", message));
                }
            }
        }
        if changed {
            self.feed.refresh();
        }
    }

    fn poll_actions(&mut self) {
        while let Ok(result) = self.action_rx.try_recv() {
            self.finish_action(result);
        }
    }

    /// Keep the selection on the same file across refreshes; fall back to the
    /// same position when the file is gone.
    fn reconcile_selection(&mut self) {
        let entries = self.feed.entries();
        let by_path = self
            .selected_path
            .as_deref()
            .and_then(|path| entries.iter().position(|e| e.file == path));
        let index = by_path.unwrap_or_else(|| self.selected.min(entries.len().saturating_sub(1)));
        self.select(index);
    }

    fn select(&mut self, index: usize) {
        let path = self.feed.entries().get(index).map(|e| e.file.clone());
        if path != self.selected_path {
            self.focused_hunk = None;
            self.scroll = 0;
        }
        self.selected = index;
        self.selected_path = path;
        self.sync_editor();
    }

    /// Push the selected entry into the editor.
    fn sync_editor(&mut self) {
        let mode = self.mode();
        let Some(entry) = self.selected_entry() else {
            self.editor.set_hunk_actions(Vec::new());
            self.editor.clear();
            return;
        };
        let request = entry.to_request();
        let hunks = entry.hunk_actions(mode);

        if let Some(outcome) = self.editor.sync(&request) {
            if outcome.rebound {
                debug!(path = %request.path, "editor rebound");
            }
        }
        self.editor.set_hunk_actions(hunks);
        self.editor.set_read_only(mode.read_only());
        self.clamp_focus();
    }

    /// Drop focus from a zone that no longer exists.
    fn clamp_focus(&mut self) {
        let Some(id) = self.focused_hunk.as_deref() else {
            return;
        };
        if !self.editor.hunk_actions().iter().any(|h| h.id == id) {
            self.focused_hunk = None;
        }
    }

    // ── File navigation ──

    pub fn next_file(&mut self) {
        let len = self.feed.entries().len();
        if len == 0 {
            return;
        }
        if self.selected + 1 < len {
            self.select(self.selected + 1);
        } else if self.feed.has_more() {
            self.load_more();
        }
    }

    pub fn prev_file(&mut self) {
        if self.selected > 0 {
            self.select(self.selected - 1);
        }
    }

    pub fn open_detail(&mut self) {
        if self.selected_path.is_some() {
            self.set_mobile_view(MobileView::Detail);
        }
    }

    pub fn back_to_list(&mut self) {
        self.set_mobile_view(MobileView::List);
    }

    fn set_mobile_view(&mut self, view: MobileView) {
        if self.mobile_view == view {
            return;
        }
        self.mobile_view = view;
        if let Some(path) = &self.state_path {
            let state = UiState { mobile_view: view };
            if let Err(e) = state.save(path) {
                warn!(error = %e, "failed to save ui state");
            }
        }
    }

    // ── Zones ──

    pub fn next_zone(&mut self) {
        self.move_zone(true);
    }

    pub fn prev_zone(&mut self) {
        self.move_zone(false);
    }

    fn move_zone(&mut self, forward: bool) {
        let zones = self.editor.zones();
        if zones.is_empty() {
            return;
        }
        let current = self
            .focused_hunk
            .as_deref()
            .and_then(|id| zones.iter().position(|z| z.hunk_id == id));
        let index = match (current, forward) {
            (None, true) => 0,
            (None, false) => zones.len() - 1,
            (Some(i), true) => (i + 1) % zones.len(),
            (Some(i), false) => (i + zones.len() - 1) % zones.len(),
        };
        let zone = &zones[index];
        self.scroll = zone.after_line.saturating_sub(ZONE_SCROLL_MARGIN);
        self.focused_hunk = Some(zone.hunk_id.clone());
    }

    /// Press a button on the focused zone.
    pub fn click(&mut self, kind: HunkActionKind) {
        let Some(id) = self.focused_hunk.clone() else {
            self.notify("No hunk focused (n / N)");
            return;
        };
        match self.editor.click(&id, kind) {
            Some(request) => self.start_action(request),
            None => self.notify(&format!("{} is not available for hunk {}", kind.label(), id)),
        }
    }

    /// Run a hunk action on a background thread.
    fn start_action(&mut self, request: HunkActionRequest) {
        let (path, target) = match self.selected_entry() {
            Some(entry) => (
                entry.file.clone(),
                entry.diff.as_ref().and_then(|d| {
                    git::find_hunk(d, &request.id).map(|h| (d.patch_sides(), h.clone()))
                }),
            ),
            None => return,
        };
        let Some((sides, hunk)) = target else {
            self.notify(&format!("Hunk {} no longer exists", request.id));
            return;
        };

        self.editor
            .set_action_state(HunkActionState::running(&request.id, request.kind));

        let repo_root = self.repo_root.clone();
        let tx = self.action_tx.clone();
        let job_request = request.clone();
        let job_path = path.clone();
        let spawned = thread::Builder::new()
            .name("hr-hunk-action".into())
            .spawn(move || {
                let outcome = git::git_apply_hunk(&repo_root, &job_path, &sides, &hunk, job_request.kind)
                    .map_err(|e| format!("{:#}", e));
                let _ = tx.send(ActionResult {
                    request: job_request,
                    path: job_path,
                    outcome,
                });
            });
        if let Err(e) = spawned {
            self.finish_action(ActionResult {
                request,
                path,
                outcome: Err(format!("Failed to start git apply: {}", e)),
            });
        }
    }

    fn finish_action(&mut self, result: ActionResult) {
        self.editor.set_action_state(HunkActionState::default());
        let verb = result.request.kind.label();
        match result.outcome {
            Ok(()) => {
                info!(path = %result.path, hunk = %result.request.id, kind = verb, "hunk action applied");
                self.notify(&format!("{} hunk {} of {}", verb, result.request.id, result.path));
            }
            Err(e) => {
                warn!(path = %result.path, hunk = %result.request.id, error = %e, "hunk action failed");
                self.notify(&format!("{} failed: {}", verb, e));
            }
        }
        self.feed.refresh();
    }

    // ── Detail view ──

    pub fn scroll_down(&mut self, lines: usize) {
        let max = self
            .shown_buffer()
            .map_or(0, |b| b.line_count().saturating_sub(1));
        self.scroll = (self.scroll + lines).min(max);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn toggle_wrap(&mut self) {
        let wrap = !self.editor.wrap();
        self.editor.set_wrap(wrap);
        self.notify(if wrap { "Wrap on" } else { "Wrap off" });
    }

    pub fn toggle_original(&mut self) {
        self.show_original = !self.show_original;
        self.scroll = 0;
    }

    // ── Feed ──

    pub fn set_mode(&mut self, mode: DiffMode) {
        if mode == self.mode() {
            return;
        }
        let base = base_for(&self.repo_root, mode, self.cli_base.as_deref());
        self.feed.set_mode(mode, &base);
        self.editor.set_read_only(mode.read_only());
        self.selected = 0;
        self.selected_path = None;
        self.focused_hunk = None;
        self.scroll = 0;
        self.sync_editor();
        self.subscribe();
        self.notify(&format!("Mode: {}", mode.label()));
    }

    pub fn refresh(&mut self) {
        self.feed.refresh();
    }

    pub fn load_more(&mut self) {
        if self.feed.load_more() {
            debug!(loaded = self.feed.entries().len(), total = self.feed.total_files(), "loading more");
        }
    }

    /// (Re)establish the watcher for the current repository and mode.
    fn subscribe(&mut self) {
        if !self.watching {
            return;
        }
        let key = SubscriptionKey {
            root: PathBuf::from(&self.repo_root),
            mode: self.mode(),
        };
        let debounce_ms = self.config.feed.debounce_ms;
        if let Err(e) = self.subscription.ensure(key, debounce_ms, self.watch_tx.clone()) {
            warn!(error = %e, "failed to start file watcher");
            self.notify(&format!("Watch failed: {}", e));
        }
    }

    /// Stop background subscriptions and release every buffer.
    pub fn shutdown(&mut self) {
        self.subscription.clear();
        self.editor.teardown();
    }

    pub fn editor_failure(&self) -> Option<String> {
        match self.editor.readiness() {
            Readiness::Failed(err) => Some(err.to_string()),
            _ => None,
        }
    }

    // ── Notifications ──

    pub fn notify(&mut self, msg: &str) {
        self.message = Some(msg.to_string());
        self.message_ticks = 0;
    }

    fn age_message(&mut self) {
        if self.message.is_some() {
            self.message_ticks += 1;
            if self.message_ticks > MESSAGE_TICKS {
                self.message = None;
                self.message_ticks = 0;
            }
        }
    }
}

/// Base ref for `mode`: only branch diffs have one.
fn base_for(repo_root: &str, mode: DiffMode, cli_base: Option<&str>) -> String {
    if mode != DiffMode::Branch {
        return String::new();
    }
    if let Some(base) = cli_base {
        return base.to_string();
    }
    git::detect_base_branch_in(repo_root).unwrap_or_else(|e| {
        warn!(error = %e, "base branch detection failed");
        "main".to_string()
    })
}
