//! Timer facility used by the tic and daylight loops.
//!
//! The clock never talks to an executor directly. It arms and cancels
//! timers through the [`Scheduler`] trait, which has two implementations:
//!
//! - [`TokioScheduler`] -- each timer is a task on a Tokio runtime,
//!   cancelled by aborting the task.
//! - [`ManualScheduler`](crate::manual::ManualScheduler) -- a deterministic
//!   queue advanced explicitly, for tests and offline runs.
//!
//! Callbacks must be cheap and non-blocking; they run on the executor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Callback invoked on every timer firing.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle to an armed timer, valid until it is cancelled or (for one-shot
/// timers) has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Wrap a raw timer number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw timer number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Failure of the timer facility.
///
/// A failed arm means tics silently stop, so these are always surfaced to
/// the caller of the control operation that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerFault {
    /// The scheduler was shut down and accepts no new timers.
    #[error("scheduler is shut down")]
    Closed,

    /// No async runtime is available to run timers on.
    #[error("no timer runtime available: {reason}")]
    NoRuntime {
        /// Why the runtime could not be reached.
        reason: String,
    },

    /// A repeating timer was requested with a zero period.
    #[error("repeating timer period must be positive")]
    ZeroPeriod,
}

/// A timer facility that can arm repeating and one-shot callbacks.
pub trait Scheduler: Send + Sync {
    /// Arm a fixed-rate repeating timer whose first firing happens one
    /// `interval` from now.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the timer cannot be armed.
    fn arm_repeating(
        &self,
        interval: Duration,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerFault>;

    /// Arm a one-shot timer firing after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the timer cannot be armed.
    fn arm_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId, TimerFault>;

    /// Cancel one timer. Unknown or already-fired ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the backend fails to cancel.
    fn cancel(&self, id: TimerId) -> Result<(), TimerFault>;

    /// Cancel every timer armed through this scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the backend fails to cancel.
    fn cancel_all(&self) -> Result<(), TimerFault>;

    /// Cancel everything and refuse further arming.
    fn shutdown(&self);
}

// ---------------------------------------------------------------------------
// Tokio-backed scheduler
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TimerTable {
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
    closed: bool,
}

/// Scheduler running each timer as a task on a Tokio runtime.
pub struct TokioScheduler {
    handle: Handle,
    table: Mutex<TimerTable>,
}

impl core::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let table = self.lock();
        f.debug_struct("TokioScheduler")
            .field("armed", &table.tasks.len())
            .field("closed", &table.closed)
            .finish_non_exhaustive()
    }
}

impl TokioScheduler {
    /// Create a scheduler spawning onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            table: Mutex::new(TimerTable::default()),
        }
    }

    /// Create a scheduler on the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault::NoRuntime`] when called outside a runtime.
    pub fn current() -> Result<Self, TimerFault> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|err| TimerFault::NoRuntime {
                reason: err.to_string(),
            })
    }

    /// Number of timers that have not yet finished.
    pub fn armed_count(&self) -> usize {
        let mut table = self.lock();
        table.tasks.retain(|_, task| !task.is_finished());
        table.tasks.len()
    }

    fn lock(&self) -> MutexGuard<'_, TimerTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<F>(&self, future: F) -> Result<TimerId, TimerFault>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut table = self.lock();
        if table.closed {
            return Err(TimerFault::Closed);
        }
        table.tasks.retain(|_, task| !task.is_finished());
        let id = TimerId(table.next_id);
        table.next_id = table.next_id.saturating_add(1);
        let task = self.handle.spawn(future);
        table.tasks.insert(id, task);
        Ok(id)
    }
}

impl Scheduler for TokioScheduler {
    fn arm_repeating(
        &self,
        interval: Duration,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerFault> {
        if interval.is_zero() {
            return Err(TimerFault::ZeroPeriod);
        }
        let id = self.spawn(async move {
            let now = tokio::time::Instant::now();
            let first = now.checked_add(interval).unwrap_or(now);
            let mut ticker = tokio::time::interval_at(first, interval);
            loop {
                ticker.tick().await;
                callback();
            }
        })?;
        debug!(timer = id.get(), interval_ms = interval.as_millis(), "Repeating timer armed");
        Ok(id)
    }

    fn arm_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId, TimerFault> {
        let id = self.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        })?;
        debug!(timer = id.get(), delay_ms = delay.as_millis(), "One-shot timer armed");
        Ok(id)
    }

    fn cancel(&self, id: TimerId) -> Result<(), TimerFault> {
        if let Some(task) = self.lock().tasks.remove(&id) {
            task.abort();
            debug!(timer = id.get(), "Timer cancelled");
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), TimerFault> {
        let mut table = self.lock();
        for (_, task) in table.tasks.drain() {
            task.abort();
        }
        Ok(())
    }

    fn shutdown(&self) {
        let mut table = self.lock();
        table.closed = true;
        for (_, task) in table.tasks.drain() {
            task.abort();
        }
        debug!("Tokio scheduler shut down");
    }
}
