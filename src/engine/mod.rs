pub mod buffer;
pub mod host;
pub mod language;
pub mod overlay;
pub mod runtime;
pub mod schedule;
pub mod sync;

use tracing::{debug, info};

pub use buffer::{BufferId, TextBuffer};
pub use host::{DiffHost, ModelPair};
pub use overlay::{
    HunkAction, HunkActionKind, HunkActionRequest, HunkActionState, OverlayManager, OverlayZone,
    ZoneButton,
};
pub use runtime::{InitError, InitStatus, InitTicket};
pub use sync::{DiffRequest, ModelSync, SyncOutcome};

use schedule::Coalescer;

/// Whether the renderer behind a [`DiffEditor`] can accept work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    /// Terminal for this editor; nothing is retried.
    Failed(InitError),
}

/// What one [`DiffEditor::flush`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub disposed: usize,
    pub recomputed: bool,
}

/// One mounted diff view: two synchronized buffers plus their overlay rows,
/// presented through a [`DiffHost`].
///
/// Work requested during a tick is deferred to [`DiffEditor::flush`], which the
/// event loop calls once per iteration.
pub struct DiffEditor<H: DiffHost> {
    host: H,
    models: ModelSync,
    overlays: OverlayManager,
    recompute: Coalescer,
    readiness: Readiness,
    /// Latest request received before the renderer became ready.
    queued: Option<DiffRequest>,
    read_only: bool,
    wrap: bool,
    torn_down: bool,
}

impl<H: DiffHost> DiffEditor<H> {
    pub fn new(host: H, hunk_actions_enabled: bool) -> Self {
        DiffEditor {
            host,
            models: ModelSync::default(),
            overlays: OverlayManager::new(hunk_actions_enabled),
            recompute: Coalescer::default(),
            readiness: Readiness::Pending,
            queued: None,
            read_only: false,
            wrap: false,
            torn_down: false,
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready && !self.torn_down
    }

    /// The renderer finished initializing: apply buffered state and replay the
    /// latest buffered request.
    pub fn mark_ready(&mut self) {
        if self.torn_down || self.readiness != Readiness::Pending {
            return;
        }
        info!("diff editor ready");
        self.readiness = Readiness::Ready;
        self.host.set_read_only(self.read_only);
        self.host.set_wrap(self.wrap);
        if let Some(request) = self.queued.take() {
            debug!(path = %request.path, "replaying buffered sync");
            self.sync(&request);
        }
        self.recompute.request();
    }

    pub fn mark_failed(&mut self, err: InitError) {
        if self.readiness != Readiness::Pending {
            return;
        }
        info!(error = %err, "diff editor failed to initialize");
        self.queued = None;
        self.readiness = Readiness::Failed(err);
    }

    /// Bring both buffers in line with `request`. Before the renderer is ready
    /// the request is kept (replacing any earlier one) and `None` is returned.
    pub fn sync(&mut self, request: &DiffRequest) -> Option<SyncOutcome> {
        if self.torn_down {
            return None;
        }
        match self.readiness {
            Readiness::Ready => {}
            Readiness::Pending => {
                self.queued = Some(request.clone());
                return None;
            }
            Readiness::Failed(_) => return None,
        }

        let outcome = self.models.sync(request, &mut self.host);
        self.recompute.request();
        Some(outcome)
    }

    /// Show nothing: detach the host and retire both buffers. The editor
    /// stays usable and the next `sync` binds a fresh pair.
    pub fn clear(&mut self) {
        if self.torn_down {
            return;
        }
        self.queued = None;
        if self.readiness == Readiness::Ready && self.models.unbind(&mut self.host) {
            self.recompute.request();
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        if self.torn_down {
            return;
        }
        self.read_only = read_only;
        if self.readiness == Readiness::Ready {
            self.host.set_read_only(read_only);
        }
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        if self.torn_down {
            return;
        }
        self.wrap = wrap;
        if self.readiness == Readiness::Ready {
            self.host.set_wrap(wrap);
        }
    }

    pub fn set_hunk_actions(&mut self, hunks: Vec<HunkAction>) {
        if !self.torn_down && self.overlays.set_hunks(hunks) {
            self.recompute.request();
        }
    }

    pub fn set_hunk_actions_enabled(&mut self, enabled: bool) {
        if !self.torn_down && self.overlays.set_enabled(enabled) {
            self.recompute.request();
        }
    }

    pub fn set_action_state(&mut self, state: HunkActionState) {
        if !self.torn_down && self.overlays.set_state(state) {
            self.recompute.request();
        }
    }

    /// A click on a zone button; `Some` is the hunk action event.
    pub fn click(&self, hunk_id: &str, kind: HunkActionKind) -> Option<HunkActionRequest> {
        if !self.is_ready() {
            return None;
        }
        let request = self.overlays.click(hunk_id, kind);
        if let Some(req) = &request {
            info!(hunk = %req.id, kind = req.kind.label(), "hunk action requested");
        }
        request
    }

    /// End of a scheduling tick: dispose buffers retired by this tick's syncs,
    /// then run at most one overlay recompute.
    pub fn flush(&mut self) -> FlushOutcome {
        if !self.is_ready() {
            return FlushOutcome::default();
        }
        let disposed = self.models.dispose_retired(&mut self.host);
        let recomputed = self.recompute.take();
        if recomputed {
            let line_count = self.models.modified().map(TextBuffer::line_count);
            self.overlays.recompute(line_count, &mut self.host);
        }
        FlushOutcome {
            disposed,
            recomputed,
        }
    }

    /// Stop accepting work, clear overlays, detach the host and dispose every
    /// buffer. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.queued = None;
        self.recompute.cancel();
        if self.readiness == Readiness::Ready {
            self.overlays.clear(&mut self.host);
        }
        self.models.teardown(&mut self.host);
        debug!("diff editor torn down");
    }

    pub fn original(&self) -> Option<&TextBuffer> {
        self.models.original()
    }

    pub fn modified(&self) -> Option<&TextBuffer> {
        self.models.modified()
    }

    pub fn zones(&self) -> &[OverlayZone] {
        self.overlays.zones()
    }

    pub fn hunk_actions(&self) -> &[HunkAction] {
        self.overlays.hunks()
    }

    pub fn action_state(&self) -> &HunkActionState {
        self.overlays.state()
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn recompute_count(&self) -> u64 {
        self.overlays.recompute_count()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: DiffHost> Drop for DiffEditor<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
