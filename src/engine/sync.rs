use tracing::debug;

use super::buffer::{BufferId, TextBuffer};
use super::host::{DiffHost, ModelPair};
use super::language::language_for_path;

/// One file's before/after content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffRequest {
    pub path: String,
    pub original_text: String,
    pub modified_text: String,
    /// Path of the original side when it differs (renames).
    pub original_path: Option<String>,
}

/// What a single `sync` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The host was bound to a new pairing.
    pub rebound: bool,
    /// Buffers created from scratch.
    pub created: usize,
    /// Buffers moved to the disposal queue.
    pub retired: usize,
    /// Some kept buffer had its text or language updated.
    pub content_changed: bool,
}

/// Keeps one original and one modified buffer alive and in step with the
/// latest [`DiffRequest`].
///
/// Replacement is a two-phase commit: `sync` builds the new pair and rebinds
/// the host, and superseded buffers wait in a queue until
/// [`ModelSync::dispose_retired`] runs on a later tick.
#[derive(Debug, Default)]
pub struct ModelSync {
    original: Option<TextBuffer>,
    modified: Option<TextBuffer>,
    bound: Option<ModelPair>,
    retired: Vec<TextBuffer>,
}

impl ModelSync {
    pub fn original(&self) -> Option<&TextBuffer> {
        self.original.as_ref()
    }

    pub fn modified(&self) -> Option<&TextBuffer> {
        self.modified.as_ref()
    }

    pub fn bound(&self) -> Option<&ModelPair> {
        self.bound.as_ref()
    }

    pub fn pending_disposals(&self) -> usize {
        self.retired.len()
    }

    pub fn sync(&mut self, request: &DiffRequest, host: &mut dyn DiffHost) -> SyncOutcome {
        let modified_id = BufferId::modified(&request.path);
        let original_id = BufferId::original(&modified_id, request.original_path.as_deref());
        let modified_language = language_for_path(request.path.as_str());
        let original_language = match request.original_path.as_deref() {
            Some(path) if !path.is_empty() => language_for_path(path),
            _ => modified_language,
        };

        let mut outcome = SyncOutcome::default();

        // Current buffers are candidates for reuse first, then anything still
        // waiting for disposal.
        let mut pool: Vec<TextBuffer> = self
            .original
            .take()
            .into_iter()
            .chain(self.modified.take())
            .collect();

        let original = self.reconcile(
            &mut pool,
            original_id,
            &request.original_text,
            original_language,
            &mut outcome,
        );
        let modified = self.reconcile(
            &mut pool,
            modified_id,
            &request.modified_text,
            modified_language,
            &mut outcome,
        );

        for stale in pool {
            debug!(buffer = %stale.id(), "retiring buffer");
            outcome.retired += 1;
            self.retired.push(stale);
        }

        let pair = ModelPair {
            original: original.id().clone(),
            modified: modified.id().clone(),
        };
        self.original = Some(original);
        self.modified = Some(modified);

        if self.bound.as_ref() != Some(&pair) {
            debug!(original = %pair.original, modified = %pair.modified, "rebinding host");
            host.bind(&pair);
            self.bound = Some(pair);
            outcome.rebound = true;
        }

        outcome
    }

    /// Find or create the buffer for `id` and bring it up to date.
    fn reconcile(
        &mut self,
        pool: &mut Vec<TextBuffer>,
        id: BufferId,
        text: &str,
        language: &'static str,
        outcome: &mut SyncOutcome,
    ) -> TextBuffer {
        let reused = match pool.iter().position(|b| *b.id() == id) {
            Some(idx) => Some(pool.swap_remove(idx)),
            None => self
                .retired
                .iter()
                .position(|b| *b.id() == id)
                .map(|idx| {
                    debug!(buffer = %id, "reclaiming retired buffer");
                    self.retired.swap_remove(idx)
                }),
        };

        match reused {
            Some(mut buffer) => {
                let language_changed = buffer.set_language(language);
                let text_changed = buffer.replace_text(text);
                outcome.content_changed |= language_changed || text_changed;
                buffer
            }
            None => {
                debug!(buffer = %id, language, "creating buffer");
                outcome.created += 1;
                TextBuffer::new(id, text, language)
            }
        }
    }

    /// Dispose every buffer retired by earlier `sync` calls. The host was
    /// rebound away from them when they were retired.
    pub fn dispose_retired(&mut self, host: &mut dyn DiffHost) -> usize {
        let count = self.retired.len();
        for buffer in self.retired.drain(..) {
            debug!(buffer = %buffer.id(), "disposing buffer");
            host.release(buffer.id());
        }
        count
    }

    /// Detach the host and retire both buffers; they are disposed with the
    /// next [`ModelSync::dispose_retired`]. Returns false when nothing was held.
    pub fn unbind(&mut self, host: &mut dyn DiffHost) -> bool {
        if self.bound.take().is_some() {
            debug!("detaching host");
            host.detach();
        }
        let mut retired = false;
        for buffer in self.original.take().into_iter().chain(self.modified.take()) {
            debug!(buffer = %buffer.id(), "retiring buffer");
            self.retired.push(buffer);
            retired = true;
        }
        retired
    }

    /// Detach the host and dispose everything, retired buffers included.
    pub fn teardown(&mut self, host: &mut dyn DiffHost) {
        if self.bound.take().is_some() {
            host.detach();
        }
        self.dispose_retired(host);
        for buffer in self.original.take().into_iter().chain(self.modified.take()) {
            debug!(buffer = %buffer.id(), "disposing buffer on teardown");
            host.release(buffer.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::host::recording::{HostCall, RecordingHost};

    fn request(path: &str, original: &str, modified: &str) -> DiffRequest {
        DiffRequest {
            path: path.to_string(),
            original_text: original.to_string(),
            modified_text: modified.to_string(),
            original_path: None,
        }
    }

    fn pair(original: &str, modified: &str) -> ModelPair {
        ModelPair {
            original: BufferId::modified(original),
            modified: BufferId::modified(modified),
        }
    }

    #[test]
    fn first_sync_creates_both_buffers_and_binds() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();

        let outcome = sync.sync(&request("src/x.ts", "a", "b"), &mut host);

        assert!(outcome.rebound);
        assert_eq!(outcome.created, 2);
        assert_eq!(host.calls, vec![HostCall::Bind(pair("src/x.ts:base", "src/x.ts"))]);
        assert_eq!(sync.original().unwrap().text(), "a");
        assert_eq!(sync.modified().unwrap().text(), "b");
        assert_eq!(sync.modified().unwrap().language(), "typescript");
    }

    #[test]
    fn identical_request_is_idempotent() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();
        let req = request("src/x.ts", "a", "b");

        sync.sync(&req, &mut host);
        let versions = (
            sync.original().unwrap().version(),
            sync.modified().unwrap().version(),
        );
        let outcome = sync.sync(&req, &mut host);

        assert_eq!(outcome, SyncOutcome::default());
        assert_eq!(host.calls.len(), 1);
        assert_eq!(
            versions,
            (sync.original().unwrap().version(), sync.modified().unwrap().version())
        );
    }

    #[test]
    fn modified_text_change_updates_in_place() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();

        sync.sync(&request("src/x.ts", "a", "b"), &mut host);
        let outcome = sync.sync(&request("src/x.ts", "a", "c"), &mut host);

        assert!(!outcome.rebound);
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.retired, 0);
        assert!(outcome.content_changed);
        assert_eq!(sync.modified().unwrap().text(), "c");
        assert_eq!(sync.modified().unwrap().id().as_str(), "src/x.ts");
        assert_eq!(sync.original().unwrap().version(), 1);
        assert_eq!(sync.dispose_retired(&mut host), 0);
        assert!(host.released().is_empty());
    }

    #[test]
    fn path_change_rebinds_before_disposing() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();

        sync.sync(&request("a.rs", "1", "2"), &mut host);
        let outcome = sync.sync(&request("b.rs", "3", "4"), &mut host);

        assert!(outcome.rebound);
        assert_eq!(outcome.retired, 2);
        assert!(host.released().is_empty(), "nothing disposed during sync");
        assert_eq!(sync.pending_disposals(), 2);

        sync.dispose_retired(&mut host);

        let bind_new = host
            .position(&HostCall::Bind(pair("b.rs:base", "b.rs")))
            .unwrap();
        let release_old = host.position(&HostCall::Release("a.rs".into())).unwrap();
        let release_old_base = host
            .position(&HostCall::Release("a.rs:base".into()))
            .unwrap();
        assert!(bind_new < release_old);
        assert!(bind_new < release_old_base);
        assert_eq!(sync.pending_disposals(), 0);
    }

    #[test]
    fn retired_buffer_is_reclaimed_when_requested_again() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();

        sync.sync(&request("a.rs", "1", "2"), &mut host);
        sync.sync(&request("b.rs", "3", "4"), &mut host);
        let outcome = sync.sync(&request("a.rs", "1", "2"), &mut host);

        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.retired, 2);
        sync.dispose_retired(&mut host);
        let mut released = host.released();
        released.sort();
        assert_eq!(released, vec!["b.rs".to_string(), "b.rs:base".to_string()]);
    }

    #[test]
    fn language_follows_path_on_rename() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();

        let mut req = request("src/lib.rs", "old", "new");
        req.original_path = Some("src/lib.py".into());
        sync.sync(&req, &mut host);

        assert_eq!(sync.original().unwrap().id().as_str(), "src/lib.py");
        assert_eq!(sync.original().unwrap().language(), "python");
        assert_eq!(sync.modified().unwrap().language(), "rust");
    }

    #[test]
    fn teardown_detaches_then_disposes_everything() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();

        sync.sync(&request("a.rs", "1", "2"), &mut host);
        sync.sync(&request("b.rs", "3", "4"), &mut host);
        sync.teardown(&mut host);

        let detach = host.position(&HostCall::Detach).unwrap();
        assert!(host
            .calls
            .iter()
            .skip(detach + 1)
            .all(|c| matches!(c, HostCall::Release(_))));
        assert_eq!(host.released().len(), 4);
        assert!(sync.modified().is_none());
        assert!(sync.bound().is_none());
    }

    #[test]
    fn unbind_detaches_before_anything_is_disposed() {
        let mut sync = ModelSync::default();
        let mut host = RecordingHost::default();
        sync.sync(&request("a.rs", "1", "2"), &mut host);
        host.calls.clear();

        assert!(sync.unbind(&mut host));
        assert_eq!(host.calls, vec![HostCall::Detach]);
        assert!(sync.original().is_none() && sync.modified().is_none());
        assert_eq!(sync.pending_disposals(), 2);

        assert_eq!(sync.dispose_retired(&mut host), 2);
        assert_eq!(host.released().len(), 2);
        assert!(!sync.unbind(&mut host));

        let outcome = sync.sync(&request("a.rs", "1", "2"), &mut host);
        assert!(outcome.rebound);
        assert_eq!(outcome.created, 2);
    }
}
