//! The diff list: fetched from git on a background thread, paged, and
//! re-fetched when the working tree changes.

mod entry;
mod exclude;

use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::git::{self, DiffFile, DiffMode, FileStat};
use crate::view::PanelSignals;

pub use entry::{build_entry, fingerprint, DiffEntry};
pub use exclude::ExcludeSet;

/// Results sent back by fetch threads. Each carries the generation of the
/// fetch that produced it.
#[derive(Debug)]
pub enum FeedMessage {
    Summary {
        generation: u64,
        stats: Vec<FileStat>,
    },
    Loaded {
        generation: u64,
        fingerprint: String,
        entries: Vec<DiffEntry>,
        remaining: Vec<DiffFile>,
    },
    /// The diff matches what is already loaded.
    Unchanged { generation: u64 },
    More {
        generation: u64,
        entries: Vec<DiffEntry>,
    },
    /// A later page could not be built; the loaded list still stands.
    PageFailed { generation: u64, error: String },
    Failed { generation: u64, error: String },
}

impl FeedMessage {
    pub fn generation(&self) -> u64 {
        match self {
            FeedMessage::Summary { generation, .. }
            | FeedMessage::Loaded { generation, .. }
            | FeedMessage::Unchanged { generation }
            | FeedMessage::More { generation, .. }
            | FeedMessage::PageFailed { generation, .. }
            | FeedMessage::Failed { generation, .. } => *generation,
        }
    }
}

/// Everything a fetch thread needs, owned.
#[derive(Debug, Clone)]
struct FetchJob {
    generation: u64,
    repo_root: String,
    mode: DiffMode,
    base: String,
    page_size: usize,
    excludes: ExcludeSet,
    known_fingerprint: Option<String>,
}

impl FetchJob {
    fn run(self, tx: &mpsc::Sender<FeedMessage>) {
        let generation = self.generation;
        let message = match self.fetch(tx) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, generation, "diff fetch failed");
                FeedMessage::Failed {
                    generation,
                    error: format!("{:#}", e),
                }
            }
        };
        let _ = tx.send(message);
    }

    fn fetch(self, tx: &mpsc::Sender<FeedMessage>) -> Result<FeedMessage> {
        let mut stats = git::git_diff_numstat(self.mode, &self.base, &self.repo_root)?;
        stats.retain(|s| !self.excludes.is_excluded(&s.path));
        let _ = tx.send(FeedMessage::Summary {
            generation: self.generation,
            stats,
        });

        let raw = git::git_diff_raw(self.mode, &self.base, &self.repo_root)?;
        let fingerprint = fingerprint(self.mode, &self.base, &raw);
        if self.known_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!(generation = self.generation, "diff unchanged");
            return Ok(FeedMessage::Unchanged {
                generation: self.generation,
            });
        }

        let mut files: Vec<DiffFile> = git::parse_diff(&raw)
            .into_iter()
            .filter(|f| !self.excludes.is_excluded(&f.path))
            .collect();
        let remaining = files.split_off(self.page_size.min(files.len()));
        let entries = build_entries(&self.repo_root, self.mode, &self.base, files)?;
        info!(
            generation = self.generation,
            loaded = entries.len(),
            remaining = remaining.len(),
            "diff fetched"
        );

        Ok(FeedMessage::Loaded {
            generation: self.generation,
            fingerprint,
            entries,
            remaining,
        })
    }
}

fn build_entries(
    repo_root: &str,
    mode: DiffMode,
    base: &str,
    files: Vec<DiffFile>,
) -> Result<Vec<DiffEntry>> {
    files
        .into_iter()
        .map(|file| build_entry(repo_root, mode, base, file))
        .collect()
}

/// Loading state and contents of the diff list for one repository and mode.
pub struct DiffFeed {
    repo_root: String,
    mode: DiffMode,
    base: String,
    page_size: usize,
    excludes: ExcludeSet,

    entries: Vec<DiffEntry>,
    remaining: Vec<DiffFile>,
    /// Page taken from `remaining` whose entries are still being built
    pending_page: Option<Vec<DiffFile>>,
    /// Last page failure, until the app picks it up
    page_error: Option<String>,
    summary: Option<Vec<FileStat>>,
    loading: bool,
    loading_more: bool,
    loaded: bool,
    error: Option<String>,
    generation: u64,
    fingerprint: Option<String>,

    tx: mpsc::Sender<FeedMessage>,
    rx: mpsc::Receiver<FeedMessage>,
}

impl DiffFeed {
    pub fn new(repo_root: &str, mode: DiffMode, base: &str, config: &FeedConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        DiffFeed {
            repo_root: repo_root.to_string(),
            mode,
            base: base.to_string(),
            page_size: config.page_size.max(1),
            excludes: ExcludeSet::new(&config.exclude),
            entries: Vec::new(),
            remaining: Vec::new(),
            pending_page: None,
            page_error: None,
            summary: None,
            loading: false,
            loading_more: false,
            loaded: false,
            error: None,
            generation: 0,
            fingerprint: None,
            tx,
            rx,
        }
    }

    // ── Accessors ──

    pub fn repo_root(&self) -> &str {
        &self.repo_root
    }

    pub fn mode(&self) -> DiffMode {
        self.mode
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn entry(&self, path: &str) -> Option<&DiffEntry> {
        self.entries.iter().find(|e| e.file == path)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn has_more(&self) -> bool {
        !self.remaining.is_empty()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn summary(&self) -> Option<&[FileStat]> {
        self.summary.as_deref()
    }

    /// Files known to the last fetch, loaded or not.
    pub fn total_files(&self) -> usize {
        self.entries.len() + self.remaining.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn panel_signals(&self) -> PanelSignals<'_> {
        PanelSignals {
            loading: self.loading,
            error: self.error.as_deref(),
            diff_count: self.entries.len(),
            diff_loaded: self.loaded,
            has_summary_changes: self.summary.as_ref().is_some_and(|s| !s.is_empty()),
        }
    }

    // ── Fetching ──

    /// Switch mode (and base); the loaded list no longer applies.
    pub fn set_mode(&mut self, mode: DiffMode, base: &str) {
        if self.mode == mode && self.base == base {
            return;
        }
        self.mode = mode;
        self.base = base.to_string();
        self.entries.clear();
        self.remaining.clear();
        self.pending_page = None;
        self.summary = None;
        self.loaded = false;
        self.fingerprint = None;
        self.refresh();
    }

    /// Start a new fetch. Results of any earlier fetch still in flight are
    /// dropped when they arrive.
    pub fn refresh(&mut self) {
        let job = self.begin_fetch();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("hr-feed".into())
            .spawn(move || job.run(&tx));
        if let Err(e) = spawned {
            self.fail(format!("Failed to start diff fetch: {}", e));
        }
    }

    fn begin_fetch(&mut self) -> FetchJob {
        // The page in flight will be dropped as stale; its files go back
        self.restore_pending_page();
        self.generation += 1;
        self.loading = true;
        debug!(generation = self.generation, mode = self.mode.as_str(), "diff fetch started");
        FetchJob {
            generation: self.generation,
            repo_root: self.repo_root.clone(),
            mode: self.mode,
            base: self.base.clone(),
            page_size: self.page_size,
            excludes: self.excludes.clone(),
            known_fingerprint: if self.loaded {
                self.fingerprint.clone()
            } else {
                None
            },
        }
    }

    /// Load the next page. Returns false when there is nothing to load or a
    /// load is already running.
    pub fn load_more(&mut self) -> bool {
        let Some(files) = self.take_next_page() else {
            return false;
        };

        let generation = self.generation;
        let repo_root = self.repo_root.clone();
        let mode = self.mode;
        let base = self.base.clone();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("hr-feed-more".into())
            .spawn(move || {
                let message = match build_entries(&repo_root, mode, &base, files) {
                    Ok(entries) => FeedMessage::More { generation, entries },
                    Err(e) => FeedMessage::PageFailed {
                        generation,
                        error: format!("{:#}", e),
                    },
                };
                let _ = tx.send(message);
            });
        if let Err(e) = spawned {
            self.fail_page(format!("Failed to start page load: {}", e));
        }
        true
    }

    /// Take the last page failure, if any.
    pub fn take_page_error(&mut self) -> Option<String> {
        self.page_error.take()
    }

    fn take_next_page(&mut self) -> Option<Vec<DiffFile>> {
        if self.loading || self.loading_more || self.remaining.is_empty() {
            return None;
        }
        self.loading_more = true;
        let n = self.page_size.min(self.remaining.len());
        let page: Vec<DiffFile> = self.remaining.drain(..n).collect();
        self.pending_page = Some(page.clone());
        Some(page)
    }

    fn restore_pending_page(&mut self) {
        if let Some(page) = self.pending_page.take() {
            debug!(files = page.len(), "returning unfinished page");
            self.remaining.splice(0..0, page);
        }
        self.loading_more = false;
    }

    fn fail_page(&mut self, error: String) {
        warn!(error = %error, "page load failed");
        self.restore_pending_page();
        self.page_error = Some(error);
    }

    fn fail(&mut self, error: String) {
        warn!(error = %error, "diff feed error");
        self.loading = false;
        self.loading_more = false;
        self.error = Some(error);
    }

    /// Apply every message that has arrived. Returns true when anything
    /// visible changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.rx.try_recv() {
            changed |= self.apply(message);
        }
        changed
    }

    pub(crate) fn apply(&mut self, message: FeedMessage) -> bool {
        if message.generation() != self.generation {
            debug!(
                stale = message.generation(),
                current = self.generation,
                "dropping stale feed message"
            );
            return false;
        }

        match message {
            FeedMessage::Summary { stats, .. } => {
                self.summary = Some(stats);
            }
            FeedMessage::Loaded {
                fingerprint,
                entries,
                remaining,
                ..
            } => {
                self.entries = entries;
                self.remaining = remaining;
                self.fingerprint = Some(fingerprint);
                self.loading = false;
                self.loaded = true;
                self.error = None;
            }
            FeedMessage::Unchanged { .. } => {
                self.loading = false;
                self.error = None;
            }
            FeedMessage::More { entries, .. } => {
                self.entries.extend(entries);
                self.pending_page = None;
                self.loading_more = false;
            }
            FeedMessage::PageFailed { error, .. } => {
                self.fail_page(error);
            }
            FeedMessage::Failed { error, .. } => {
                self.fail(error);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{resolve_panel_view, PanelView};

    fn feed(page_size: usize) -> DiffFeed {
        let config = FeedConfig {
            page_size,
            ..FeedConfig::default()
        };
        DiffFeed::new("/repo", DiffMode::Unstaged, "", &config)
    }

    fn entry(path: &str) -> DiffEntry {
        DiffEntry {
            file: path.to_string(),
            additions: 1,
            deletions: 0,
            before: String::new(),
            after: "x\n".into(),
            diff: None,
            meta: None,
        }
    }

    fn file(path: &str) -> DiffFile {
        let raw = format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -0,0 +1 @@\n+x\n");
        git::parse_diff(&raw).remove(0)
    }

    fn stat(path: &str) -> FileStat {
        FileStat {
            path: path.to_string(),
            additions: 1,
            deletions: 0,
            binary: false,
        }
    }

    fn panel(feed: &DiffFeed) -> PanelView {
        resolve_panel_view(feed.panel_signals())
    }

    #[test]
    fn summary_before_entries_reads_as_loading() {
        let mut feed = feed(10);
        let job = feed.begin_fetch();
        assert_eq!(panel(&feed), PanelView::Loading);

        feed.apply(FeedMessage::Summary {
            generation: job.generation,
            stats: vec![stat("a.rs")],
        });
        assert_eq!(panel(&feed), PanelView::Loading);

        feed.apply(FeedMessage::Loaded {
            generation: job.generation,
            fingerprint: "f1".into(),
            entries: vec![entry("a.rs")],
            remaining: Vec::new(),
        });
        assert_eq!(panel(&feed), PanelView::List);
        assert!(!feed.has_more());
    }

    #[test]
    fn empty_repository_reads_as_empty() {
        let mut feed = feed(10);
        let job = feed.begin_fetch();
        feed.apply(FeedMessage::Summary {
            generation: job.generation,
            stats: Vec::new(),
        });
        feed.apply(FeedMessage::Loaded {
            generation: job.generation,
            fingerprint: "f".into(),
            entries: Vec::new(),
            remaining: Vec::new(),
        });
        assert_eq!(panel(&feed), PanelView::Empty);
    }

    #[test]
    fn stale_generations_are_dropped() {
        let mut feed = feed(10);
        let first = feed.begin_fetch();
        let second = feed.begin_fetch();

        assert!(!feed.apply(FeedMessage::Loaded {
            generation: first.generation,
            fingerprint: "old".into(),
            entries: vec![entry("old.rs")],
            remaining: Vec::new(),
        }));
        assert!(feed.entries().is_empty());
        assert!(feed.loading());

        assert!(feed.apply(FeedMessage::Loaded {
            generation: second.generation,
            fingerprint: "new".into(),
            entries: vec![entry("new.rs")],
            remaining: Vec::new(),
        }));
        assert_eq!(feed.entries()[0].file, "new.rs");
    }

    #[test]
    fn failure_surfaces_verbatim_and_clears_on_success() {
        let mut feed = feed(10);
        let job = feed.begin_fetch();
        feed.apply(FeedMessage::Failed {
            generation: job.generation,
            error: "git diff failed: fatal: bad revision 'nope'".into(),
        });
        assert_eq!(feed.error(), Some("git diff failed: fatal: bad revision 'nope'"));
        assert_eq!(panel(&feed), PanelView::Error);

        let job = feed.begin_fetch();
        assert_eq!(panel(&feed), PanelView::Loading);
        feed.apply(FeedMessage::Unchanged {
            generation: job.generation,
        });
        assert!(feed.error().is_none());
    }

    #[test]
    fn known_fingerprint_is_offered_only_once_loaded() {
        let mut feed = feed(10);
        let job = feed.begin_fetch();
        assert!(job.known_fingerprint.is_none());
        feed.apply(FeedMessage::Loaded {
            generation: job.generation,
            fingerprint: "abc".into(),
            entries: vec![entry("a.rs")],
            remaining: Vec::new(),
        });

        let next = feed.begin_fetch();
        assert_eq!(next.known_fingerprint.as_deref(), Some("abc"));
        feed.apply(FeedMessage::Unchanged {
            generation: next.generation,
        });
        assert_eq!(feed.entries().len(), 1);
        assert!(!feed.loading());
    }

    #[test]
    fn pages_are_taken_in_order() {
        let mut feed = feed(2);
        let job = feed.begin_fetch();
        feed.apply(FeedMessage::Loaded {
            generation: job.generation,
            fingerprint: "f".into(),
            entries: vec![entry("a"), entry("b")],
            remaining: vec![file("c"), file("d"), file("e")],
        });
        assert!(feed.has_more());
        assert_eq!(feed.total_files(), 5);

        let page = feed.take_next_page().unwrap();
        let paths: Vec<&str> = page.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["c", "d"]);
        assert!(feed.loading_more());
        assert!(feed.take_next_page().is_none(), "one page load at a time");

        feed.apply(FeedMessage::More {
            generation: job.generation,
            entries: vec![entry("c"), entry("d")],
        });
        assert!(!feed.loading_more());
        assert_eq!(feed.entries().len(), 4);
        assert!(feed.has_more());
    }

    fn loaded_with_pages(feed: &mut DiffFeed) -> u64 {
        let job = feed.begin_fetch();
        feed.apply(FeedMessage::Loaded {
            generation: job.generation,
            fingerprint: "f".into(),
            entries: vec![entry("a"), entry("b")],
            remaining: vec![file("c"), file("d"), file("e")],
        });
        job.generation
    }

    #[test]
    fn refresh_during_page_load_keeps_the_page() {
        let mut feed = feed(2);
        let first = loaded_with_pages(&mut feed);
        feed.take_next_page().unwrap();

        let job = feed.begin_fetch();
        assert!(!feed.loading_more());
        assert!(!feed.apply(FeedMessage::More {
            generation: first,
            entries: vec![entry("c"), entry("d")],
        }));
        feed.apply(FeedMessage::Unchanged {
            generation: job.generation,
        });

        assert_eq!(feed.total_files(), 5);
        assert_eq!(feed.entries().len(), 2);
        let page = feed.take_next_page().unwrap();
        let paths: Vec<&str> = page.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["c", "d"]);
    }

    #[test]
    fn failed_page_keeps_the_list_and_its_files() {
        let mut feed = feed(2);
        let generation = loaded_with_pages(&mut feed);
        feed.take_next_page().unwrap();

        feed.apply(FeedMessage::PageFailed {
            generation,
            error: "git show :c failed".into(),
        });

        assert!(feed.error().is_none());
        assert_eq!(panel(&feed), PanelView::List);
        assert!(!feed.loading_more());
        assert_eq!(feed.total_files(), 5);
        assert_eq!(feed.take_page_error().as_deref(), Some("git show :c failed"));
        assert!(feed.take_page_error().is_none());
        assert!(feed.take_next_page().is_some(), "page can be retried");
    }

    #[test]
    fn finished_page_is_not_restored_by_a_later_fetch() {
        let mut feed = feed(2);
        let generation = loaded_with_pages(&mut feed);
        feed.take_next_page().unwrap();
        feed.apply(FeedMessage::More {
            generation,
            entries: vec![entry("c"), entry("d")],
        });

        let job = feed.begin_fetch();
        feed.apply(FeedMessage::Unchanged {
            generation: job.generation,
        });
        assert_eq!(feed.entries().len(), 4);
        assert_eq!(feed.total_files(), 5);
    }

    #[test]
    fn no_page_loads_while_fetching() {
        let mut feed = feed(2);
        let job = feed.begin_fetch();
        feed.apply(FeedMessage::Loaded {
            generation: job.generation,
            fingerprint: "f".into(),
            entries: Vec::new(),
            remaining: vec![file("c")],
        });
        feed.begin_fetch();
        assert!(feed.take_next_page().is_none());
        assert!(!feed.load_more());
    }
}
