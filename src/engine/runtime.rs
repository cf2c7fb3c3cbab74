use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

use once_cell::sync::Lazy;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a shared runtime could not be loaded. Cloned to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    #[error("runtime loader panicked")]
    LoaderPanicked,

    #[error("failed to start runtime loader: {0}")]
    Spawn(String),

    #[error("runtime loader went away without an answer")]
    Abandoned,
}

type Outcome<T> = Result<Arc<T>, InitError>;

enum Slot<T> {
    Idle,
    Loading { waiters: Vec<mpsc::Sender<Outcome<T>>> },
    /// Held weakly: the runtime lives as long as some consumer holds it.
    Ready(Weak<T>),
    /// Remembered for the life of the process.
    Failed(InitError),
}

/// Init-once registry for a value that is expensive to build.
///
/// The first acquirer starts a background load; acquirers arriving while it
/// runs share that same load. Once every consumer has dropped the value it is
/// torn down, and the next acquirer loads it again. A failed load is never
/// retried.
pub struct SharedInit<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Default for SharedInit<T> {
    fn default() -> Self {
        SharedInit {
            slot: Arc::new(Mutex::new(Slot::Idle)),
        }
    }
}

impl<T: Send + Sync + 'static> SharedInit<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire<F>(&self, load: F) -> InitTicket<T>
    where
        F: FnOnce() -> Result<T, InitError> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        match &mut *slot {
            Slot::Ready(weak) => {
                if let Some(value) = weak.upgrade() {
                    return InitTicket::resolved(Ok(value));
                }
                debug!("shared runtime was released, loading again");
            }
            Slot::Failed(err) => return InitTicket::resolved(Err(err.clone())),
            Slot::Loading { waiters } => {
                let (tx, rx) = mpsc::channel();
                waiters.push(tx);
                return InitTicket::waiting(rx);
            }
            Slot::Idle => {}
        }

        let (tx, rx) = mpsc::channel();
        *slot = Slot::Loading { waiters: vec![tx] };

        let shared = Arc::clone(&self.slot);
        let spawned = thread::Builder::new()
            .name("hr-runtime".into())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(load))
                    .unwrap_or(Err(InitError::LoaderPanicked));
                settle(&shared, result);
            });

        if let Err(e) = spawned {
            let err = InitError::Spawn(e.to_string());
            warn!(error = %err, "runtime loader did not start");
            *slot = Slot::Failed(err.clone());
            return InitTicket::resolved(Err(err));
        }
        InitTicket::waiting(rx)
    }

    /// Whether a loaded value is currently alive.
    pub fn is_loaded(&self) -> bool {
        matches!(&*lock(&self.slot), Slot::Ready(weak) if weak.strong_count() > 0)
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    // A poisoned slot still holds a consistent state; every write is a single
    // assignment.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Record the load result and hand it to every waiter.
fn settle<T>(slot: &Mutex<Slot<T>>, result: Result<T, InitError>) {
    let (outcome, next) = match result {
        Ok(value) => {
            let value = Arc::new(value);
            let weak = Arc::downgrade(&value);
            (Ok(value), Slot::Ready(weak))
        }
        Err(err) => {
            warn!(error = %err, "shared runtime failed to load");
            (Err(err.clone()), Slot::Failed(err))
        }
    };

    let waiters = match std::mem::replace(&mut *lock(slot), next) {
        Slot::Loading { waiters } => waiters,
        _ => Vec::new(),
    };
    info!(waiters = waiters.len(), ok = outcome.is_ok(), "shared runtime settled");

    // The last waiter receives the original so this thread keeps no reference.
    if let Some((last, rest)) = waiters.split_last() {
        for waiter in rest {
            let _ = waiter.send(outcome.clone());
        }
        let _ = last.send(outcome);
    }
}

/// What a poll of an [`InitTicket`] found.
pub enum InitStatus<T> {
    Pending,
    Ready(Arc<T>),
    Failed(InitError),
}

enum TicketState<T> {
    Waiting(mpsc::Receiver<Outcome<T>>),
    Done(Outcome<T>),
}

/// One consumer's claim on a [`SharedInit`] load.
pub struct InitTicket<T> {
    state: TicketState<T>,
}

impl<T> InitTicket<T> {
    fn waiting(rx: mpsc::Receiver<Outcome<T>>) -> Self {
        InitTicket {
            state: TicketState::Waiting(rx),
        }
    }

    fn resolved(outcome: Outcome<T>) -> Self {
        InitTicket {
            state: TicketState::Done(outcome),
        }
    }

    /// Non-blocking check, called once per event loop tick.
    pub fn poll(&mut self) -> InitStatus<T> {
        let received = match &self.state {
            TicketState::Waiting(rx) => match rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => return InitStatus::Pending,
                Err(TryRecvError::Disconnected) => Some(Err(InitError::Abandoned)),
            },
            TicketState::Done(_) => None,
        };
        if let Some(outcome) = received {
            self.state = TicketState::Done(outcome);
        }

        match &self.state {
            TicketState::Done(Ok(value)) => InitStatus::Ready(Arc::clone(value)),
            TicketState::Done(Err(err)) => InitStatus::Failed(err.clone()),
            TicketState::Waiting(_) => InitStatus::Pending,
        }
    }

    /// Block until the load settles.
    pub fn wait(self) -> Outcome<T> {
        match self.state {
            TicketState::Done(outcome) => outcome,
            TicketState::Waiting(rx) => rx.recv().unwrap_or(Err(InitError::Abandoned)),
        }
    }
}

// ── Highlighting runtime ──

/// Syntax definitions and the colour theme used to paint buffers.
pub struct HighlightRuntime {
    syntax_set: SyntaxSet,
    theme: Theme,
    theme_name: String,
}

impl HighlightRuntime {
    pub fn load(theme_name: &str) -> Result<Self, InitError> {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes
            .themes
            .remove(theme_name)
            .ok_or_else(|| InitError::UnknownTheme(theme_name.to_string()))?;
        Ok(HighlightRuntime {
            syntax_set: two_face::syntax::extra_newlines(),
            theme,
            theme_name: theme_name.to_string(),
        })
    }

    pub fn syntax_set(&self) -> &SyntaxSet {
        &self.syntax_set
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }
}

static HIGHLIGHT_RUNTIME: Lazy<SharedInit<HighlightRuntime>> = Lazy::new(SharedInit::new);

/// Claim the process-wide highlighting runtime. The theme of whichever
/// acquirer started the current load wins.
pub fn acquire_highlight_runtime(theme_name: &str) -> InitTicket<HighlightRuntime> {
    let theme_name = theme_name.to_string();
    HIGHLIGHT_RUNTIME.acquire(move || HighlightRuntime::load(&theme_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn concurrent_acquirers_share_one_load() {
        let init = SharedInit::<String>::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let counter = Arc::clone(&loads);
        let first = init.acquire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = release_rx.recv();
            Ok("runtime".to_string())
        });
        let counter = Arc::clone(&loads);
        let second = init.acquire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("other".to_string())
        });
        release_tx.send(()).unwrap();

        let a = first.wait().unwrap();
        let b = second.wait().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, "runtime");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(init.is_loaded());
    }

    #[test]
    fn live_value_is_handed_out_without_loading() {
        let init = SharedInit::<u32>::new();
        let held = init.acquire(|| Ok(7)).wait().unwrap();
        let mut again = init.acquire(|| panic!("must not reload"));
        match again.poll() {
            InitStatus::Ready(value) => assert!(Arc::ptr_eq(&value, &held)),
            _ => panic!("expected an immediate value"),
        }
    }

    #[test]
    fn failure_is_remembered() {
        let init = SharedInit::<String>::new();
        let loads = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&loads);
        let first = init.acquire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(InitError::UnknownTheme("nope".into()))
        });
        assert_eq!(first.wait().unwrap_err(), InitError::UnknownTheme("nope".into()));

        let counter = Arc::clone(&loads);
        let mut second = init.acquire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("late".to_string())
        });
        assert!(matches!(second.poll(), InitStatus::Failed(InitError::UnknownTheme(_))));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_loader_fails_every_waiter() {
        let init = SharedInit::<String>::new();
        let ticket = init.acquire(|| panic!("boom"));
        assert_eq!(ticket.wait().unwrap_err(), InitError::LoaderPanicked);
    }

    #[test]
    fn released_runtime_is_loaded_again() {
        let init = SharedInit::<String>::new();
        let loads = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&loads);
        let value = init
            .acquire(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("one".to_string())
            })
            .wait()
            .unwrap();
        drop(value);
        assert!(!init.is_loaded());

        let counter = Arc::clone(&loads);
        let value = init
            .acquire(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("two".to_string())
            })
            .wait()
            .unwrap();
        assert_eq!(*value, "two");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn poll_reports_pending_until_settled() {
        let init = SharedInit::<u8>::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut ticket = init.acquire(move || {
            let _ = release_rx.recv();
            Ok(1)
        });
        assert!(matches!(ticket.poll(), InitStatus::Pending));
        release_tx.send(()).unwrap();

        let value = loop {
            match ticket.poll() {
                InitStatus::Ready(v) => break v,
                InitStatus::Pending => thread::yield_now(),
                InitStatus::Failed(e) => panic!("unexpected failure: {e}"),
            }
        };
        assert_eq!(*value, 1);
    }

    #[test]
    fn unknown_theme_is_an_init_error() {
        assert!(matches!(
            HighlightRuntime::load("no-such-theme"),
            Err(InitError::UnknownTheme(_))
        ));
    }
}
