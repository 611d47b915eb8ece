//! Job counting and cooperative cancellation for placement passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Passed through every placement call. Counts sub-placements ("jobs") and
/// exposes the abort flag the pagination scheduler polls between children.
pub trait PlacementTracker {
    fn job_started(&mut self);
    fn job_finished(&mut self);
    /// Jobs started but not yet finished.
    fn pending(&self) -> usize;
    /// Whether the current pass should stop at the next child boundary.
    fn should_abort(&self) -> bool;
}

/// A cloneable abort flag. Any holder (an event pump, another thread) may
/// request an abort; the scheduler clears it when it restarts the pass.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The stock tracker: counters plus an [`AbortHandle`].
#[derive(Debug, Default)]
pub struct JobTracker {
    started: usize,
    finished: usize,
    abort: AbortHandle,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abort_handle(abort: AbortHandle) -> Self {
        Self {
            abort,
            ..Self::default()
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn started(&self) -> usize {
        self.started
    }

    pub fn finished(&self) -> usize {
        self.finished
    }
}

impl PlacementTracker for JobTracker {
    fn job_started(&mut self) {
        self.started += 1;
    }

    fn job_finished(&mut self) {
        debug_assert!(self.finished < self.started, "job finished twice");
        self.finished += 1;
    }

    fn pending(&self) -> usize {
        self.started.saturating_sub(self.finished)
    }

    fn should_abort(&self) -> bool {
        self.abort.is_requested()
    }
}
