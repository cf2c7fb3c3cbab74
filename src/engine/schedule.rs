/// Collapses any number of requests raised within one tick into a single run.
///
/// The event loop calls [`Coalescer::take`] once per tick; requests made before
/// that point are answered by that one run.
#[derive(Debug, Default)]
pub struct Coalescer {
    pending: bool,
    requested: u64,
    runs: u64,
}

impl Coalescer {
    /// Returns true when this request scheduled a new run, false when it was
    /// folded into one already pending.
    pub fn request(&mut self) -> bool {
        self.requested += 1;
        !std::mem::replace(&mut self.pending, true)
    }

    /// Consume the pending run, if any.
    pub fn take(&mut self) -> bool {
        if std::mem::take(&mut self.pending) {
            self.runs += 1;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Drop a pending run without executing it.
    pub fn cancel(&mut self) {
        self.pending = false;
    }

    /// (requests, runs) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.requested, self.runs)
    }
}
