//! Layout session settings and the hooks a pass uses to talk to the world
//! outside the layout thread.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Horizontal direction in which entries of a line are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingOrder {
    #[default]
    LeftToRight,
    RightToLeft,
}

/// Layout-wide settings, passed by reference to every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutSession {
    pub reading_order: ReadingOrder,
    /// Two locations closer than this are the same location.
    pub position_tolerance: f64,
    /// Minimum time between two calls of the event pump during a pass.
    pub yield_interval_ms: u64,
    /// How often a waiting printer re-checks the pass state.
    pub print_poll_interval_ms: u64,
    /// Justify wrapped text lines unless a format says otherwise.
    pub justify: bool,
    /// How many aborted passes one `paginate` call restarts before it gives
    /// the abort back to the caller.
    pub max_restarts: usize,
}

impl Default for LayoutSession {
    fn default() -> Self {
        Self {
            reading_order: ReadingOrder::LeftToRight,
            position_tolerance: 1e-3,
            yield_interval_ms: 50,
            print_poll_interval_ms: 20,
            justify: false,
            max_restarts: 8,
        }
    }
}

impl LayoutSession {
    pub fn with_reading_order(mut self, order: ReadingOrder) -> Self {
        self.reading_order = order;
        self
    }

    pub fn with_position_tolerance(mut self, tolerance: f64) -> Self {
        self.position_tolerance = tolerance;
        self
    }

    pub fn with_yield_interval(mut self, interval: Duration) -> Self {
        self.yield_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_print_poll_interval(mut self, interval: Duration) -> Self {
        self.print_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_justify(mut self, justify: bool) -> Self {
        self.justify = justify;
        self
    }

    pub fn with_max_restarts(mut self, restarts: usize) -> Self {
        self.max_restarts = restarts;
        self
    }

    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_interval_ms)
    }

    pub fn print_poll_interval(&self) -> Duration {
        Duration::from_millis(self.print_poll_interval_ms)
    }
}

/// Gives the host a chance to process pending input during a long pass.
///
/// The pump may request an abort through an [`crate::placement::AbortHandle`];
/// the pass notices after the child it is working on.
pub trait EventPump {
    fn poll(&mut self, budget: Duration);
}

/// A pump that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPump;

impl EventPump for NoopPump {
    fn poll(&mut self, _budget: Duration) {}
}

/// Rate-limits calls into an [`EventPump`].
#[derive(Debug)]
pub(crate) struct YieldClock {
    interval: Duration,
    last: Instant,
}

impl YieldClock {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Calls the pump if at least one interval has passed since the last call.
    pub(crate) fn tick(&mut self, pump: &mut dyn EventPump) -> bool {
        if self.last.elapsed() < self.interval {
            return false;
        }
        pump.poll(self.interval);
        self.last = Instant::now();
        true
    }
}

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PassState {
    #[default]
    Idle,
    Running,
    Completed,
    /// Stopped early; a restart is pending.
    Aborted,
}

impl PassState {
    /// Whether the page list is consistent and may be printed.
    pub fn is_settled(self) -> bool {
        matches!(self, PassState::Idle | PassState::Completed)
    }
}

/// Result of one pagination pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassOutcome {
    /// Nothing was dirty.
    Idle,
    Completed { page_count: usize },
    /// An abort was requested; `after_child` was the last child visited.
    Aborted { after_child: usize },
}

/// Shares the pass state with other threads. A printing thread calls
/// [`PassMonitor::wait_until_settled`] to block until the in-flight pass is
/// done.
#[derive(Debug, Clone, Default)]
pub struct PassMonitor {
    inner: Arc<(Mutex<PassState>, Condvar)>,
}

impl PassMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PassState {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set(&self, state: PassState) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = state;
        cvar.notify_all();
    }

    /// Block until the pass state is settled or `timeout` elapses, waking at
    /// least every `poll_interval`. Returns whether the state settled.
    pub fn wait_until_settled(&self, timeout: Duration, poll_interval: Duration) -> bool {
        // `None` when the timeout is too large to represent: wait forever.
        let deadline = Instant::now().checked_add(timeout);
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if state.is_settled() {
                return true;
            }
            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => return false,
                Some(deadline) => poll_interval.min(deadline - now),
                None => poll_interval,
            };
            state = match cvar.wait_timeout(state, wait) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}
