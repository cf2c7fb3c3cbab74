use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::git::DiffMode;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// One or more files changed; time to refresh diffs
    FilesChanged { subscription: u64, paths: Vec<String> },
    /// The watcher reported an error (e.g. the OS watch limit was hit)
    Error { subscription: u64, message: String },
}

impl WatchEvent {
    pub fn subscription(&self) -> u64 {
        match self {
            WatchEvent::FilesChanged { subscription, .. } | WatchEvent::Error { subscription, .. } => {
                *subscription
            }
        }
    }
}

/// Whether a change under the working tree should trigger a refresh.
/// Inside `.git/` only the index (staging) and refs (commits) count.
pub fn is_relevant_path(path: &Path) -> bool {
    let components: Vec<Component<'_>> = path.components().collect();
    let Some(git_at) = components
        .iter()
        .position(|c| c.as_os_str() == ".git")
    else {
        return true;
    };

    match components.get(git_at + 1).map(|c| c.as_os_str()) {
        Some(name) if name == "index" => components.len() == git_at + 2,
        Some(name) if name == "refs" => true,
        _ => false,
    }
}

/// A debounced file watcher that monitors a git working tree
pub struct FileWatcher {
    _watcher: notify_debouncer_mini::Debouncer<RecommendedWatcher>,
}

impl FileWatcher {
    /// Start watching a directory. Changed file events are sent to the provided sender,
    /// debounced by `debounce_ms` milliseconds and tagged with `subscription`.
    pub fn new(
        root: &Path,
        debounce_ms: u64,
        subscription: u64,
        tx: mpsc::Sender<WatchEvent>,
    ) -> Result<Self> {
        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| {
                let event = match result {
                    Ok(events) => {
                        let paths: Vec<String> = events
                            .iter()
                            .filter(|e| e.kind == DebouncedEventKind::Any)
                            .filter(|e| is_relevant_path(&e.path))
                            .map(|e| e.path.to_string_lossy().into_owned())
                            .collect();
                        if paths.is_empty() {
                            return;
                        }
                        WatchEvent::FilesChanged { subscription, paths }
                    }
                    Err(e) => {
                        warn!(error = %e, "file watcher error");
                        WatchEvent::Error {
                            subscription,
                            message: e.to_string(),
                        }
                    }
                };
                if tx.send(event).is_err() {
                    debug!("watch receiver gone, dropping event");
                }
            },
        )?;

        debouncer.watcher().watch(root, RecursiveMode::Recursive)?;

        Ok(FileWatcher {
            _watcher: debouncer,
        })
    }
}

/// What a subscription watches for: one repository in one diff mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub root: PathBuf,
    pub mode: DiffMode,
}

/// At most one live watcher, re-established whenever its key changes.
#[derive(Default)]
pub struct Subscription {
    active: Option<(SubscriptionKey, FileWatcher)>,
    generation: u64,
}

impl Subscription {
    /// Make sure a watcher for `key` is running. Returns true when a new one
    /// was started; the previous watcher is dropped first.
    pub fn ensure(
        &mut self,
        key: SubscriptionKey,
        debounce_ms: u64,
        tx: mpsc::Sender<WatchEvent>,
    ) -> Result<bool> {
        if self.key() == Some(&key) {
            return Ok(false);
        }
        self.clear();

        self.generation += 1;
        let watcher = FileWatcher::new(&key.root, debounce_ms, self.generation, tx)?;
        debug!(root = %key.root.display(), mode = key.mode.as_str(), id = self.generation, "watch subscribed");
        self.active = Some((key, watcher));
        Ok(true)
    }

    pub fn key(&self) -> Option<&SubscriptionKey> {
        self.active.as_ref().map(|(key, _)| key)
    }

    /// Id carried by events of the current watcher.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Events from a torn-down watcher may still be queued.
    pub fn is_current(&self, event: &WatchEvent) -> bool {
        self.active.is_some() && event.subscription() == self.generation
    }

    pub fn clear(&mut self) {
        if let Some((key, _)) = self.active.take() {
            debug!(root = %key.root.display(), "watch unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worktree_paths_are_relevant() {
        assert!(is_relevant_path(Path::new("/repo/src/main.rs")));
        assert!(is_relevant_path(Path::new("/repo/.gitignore")));
    }

    #[test]
    fn git_dir_noise_is_filtered() {
        assert!(is_relevant_path(Path::new("/repo/.git/index")));
        assert!(is_relevant_path(Path::new("/repo/.git/refs/heads/main")));
        assert!(!is_relevant_path(Path::new("/repo/.git/objects/ab/cdef")));
        assert!(!is_relevant_path(Path::new("/repo/.git/index.lock")));
        assert!(!is_relevant_path(Path::new("/repo/.git/logs/HEAD")));
        assert!(!is_relevant_path(Path::new("/repo/.git")));
    }

    #[test]
    fn subscription_restarts_only_on_key_change() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut sub = Subscription::default();
        let key = SubscriptionKey {
            root: dir.path().to_path_buf(),
            mode: DiffMode::Unstaged,
        };

        assert!(sub.ensure(key.clone(), 100, tx.clone()).unwrap());
        assert!(!sub.ensure(key.clone(), 100, tx.clone()).unwrap());
        assert_eq!(sub.generation(), 1);

        let staged = SubscriptionKey {
            mode: DiffMode::Staged,
            ..key
        };
        assert!(sub.ensure(staged.clone(), 100, tx).unwrap());
        assert_eq!(sub.key(), Some(&staged));

        let stale = WatchEvent::FilesChanged {
            subscription: 1,
            paths: vec!["a".into()],
        };
        assert!(!sub.is_current(&stale));

        sub.clear();
        assert!(sub.key().is_none());
    }
}
