//! Deterministic wall clock and scheduler.
//!
//! [`ManualClock`] only moves when told to, and [`ManualScheduler`] fires
//! timers against it in due order as it is advanced. Together they run the
//! clock engine without real waiting: an hour of wall time is one call to
//! [`ManualScheduler::advance`].
//!
//! Timers due at the same instant fire in the order they were armed.
//! Callbacks run on the thread calling `advance`, with no scheduler lock
//! held, so they may arm or cancel timers themselves.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::timer::{Scheduler, TimerCallback, TimerFault, TimerId};
use crate::wall::WallClock;

/// A wall clock that moves only when set or advanced.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    pub const fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Jump to `ms`.
    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    /// Move forward by `ms`.
    pub fn advance(&self, ms: i64) {
        let now = self.now_ms.load(Ordering::SeqCst);
        self.now_ms.store(now.saturating_add(ms), Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

struct ManualTimer {
    due_ms: i64,
    interval_ms: Option<i64>,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualQueue {
    next_id: u64,
    timers: BTreeMap<TimerId, ManualTimer>,
    closed: bool,
}

/// A scheduler whose timers fire only when [`advance`](Self::advance) is
/// called.
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    queue: Mutex<ManualQueue>,
}

impl core::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now_ms", &self.clock.now_ms())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl ManualScheduler {
    /// Create a scheduler driving `clock`.
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(ManualQueue::default()),
        }
    }

    /// The wall clock this scheduler advances.
    pub const fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Number of armed timers.
    pub fn pending(&self) -> usize {
        self.lock().timers.len()
    }

    /// Wall time of the next firing, if any timer is armed.
    pub fn next_due(&self) -> Option<i64> {
        self.lock().timers.values().map(|timer| timer.due_ms).min()
    }

    /// Advance wall time by `ms`, firing every timer that falls due on the
    /// way. Returns the number of firings.
    pub fn advance(&self, ms: i64) -> usize {
        let target = self.clock.now_ms().saturating_add(ms);
        self.advance_to(target)
    }

    /// Advance wall time to `target_ms`, firing every timer that falls due
    /// on the way. Returns the number of firings.
    pub fn advance_to(&self, target_ms: i64) -> usize {
        let mut fired: usize = 0;
        while let Some(callback) = self.pop_due(target_ms) {
            callback();
            fired = fired.saturating_add(1);
        }
        if self.clock.now_ms() < target_ms {
            self.clock.set(target_ms);
        }
        fired
    }

    fn lock(&self) -> MutexGuard<'_, ManualQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the earliest timer due at or before `target_ms`, move the clock
    /// to its due time, and reschedule or remove it.
    fn pop_due(&self, target_ms: i64) -> Option<TimerCallback> {
        let mut queue = self.lock();
        let (id, due_ms) = queue
            .timers
            .iter()
            .filter(|(_, timer)| timer.due_ms <= target_ms)
            .min_by_key(|(id, timer)| (timer.due_ms, **id))
            .map(|(id, timer)| (*id, timer.due_ms))?;

        if self.clock.now_ms() < due_ms {
            self.clock.set(due_ms);
        }

        let timer = queue.timers.get_mut(&id)?;
        let callback = Arc::clone(&timer.callback);
        match timer.interval_ms {
            Some(interval) => timer.due_ms = timer.due_ms.saturating_add(interval),
            None => {
                queue.timers.remove(&id);
            }
        }
        Some(callback)
    }

    fn insert(
        &self,
        delay_ms: i64,
        interval_ms: Option<i64>,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerFault> {
        let mut queue = self.lock();
        if queue.closed {
            return Err(TimerFault::Closed);
        }
        let id = TimerId::new(queue.next_id);
        queue.next_id = queue.next_id.saturating_add(1);
        let due_ms = self.clock.now_ms().saturating_add(delay_ms);
        queue.timers.insert(
            id,
            ManualTimer {
                due_ms,
                interval_ms,
                callback,
            },
        );
        Ok(id)
    }
}

impl Scheduler for ManualScheduler {
    fn arm_repeating(
        &self,
        interval: Duration,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerFault> {
        let interval_ms = duration_ms(interval);
        if interval_ms <= 0 {
            return Err(TimerFault::ZeroPeriod);
        }
        self.insert(interval_ms, Some(interval_ms), callback)
    }

    fn arm_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId, TimerFault> {
        self.insert(duration_ms(delay), None, callback)
    }

    fn cancel(&self, id: TimerId) -> Result<(), TimerFault> {
        self.lock().timers.remove(&id);
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), TimerFault> {
        self.lock().timers.clear();
        Ok(())
    }

    fn shutdown(&self) {
        let mut queue = self.lock();
        queue.closed = true;
        queue.timers.clear();
    }
}
