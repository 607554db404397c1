//! Periodic tic timer.
//!
//! [`TicScheduler`] owns at most one repeating timer. It is armed fresh on
//! every start or resume at an interval of one virtual hour expressed in
//! wall milliseconds (`3_600_000 / zip`), and disarmed on pause and stop.
//! What a firing does is up to the callback the owner passes in.

use std::time::Duration;

use tracing::debug;

use crate::clock::ZipFactor;
use crate::timer::{Scheduler, TimerCallback, TimerFault, TimerId};

/// Owner of the periodic tic timer.
#[derive(Debug, Default)]
pub struct TicScheduler {
    armed: Option<TimerId>,
    interval_ms: u64,
}

impl TicScheduler {
    /// A scheduler with nothing armed.
    pub const fn new() -> Self {
        Self {
            armed: None,
            interval_ms: 0,
        }
    }

    /// Arm the repeating tic timer for `zip`, replacing any timer already
    /// armed. The first firing is one interval from now.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the old timer cannot be cancelled or the
    /// new one cannot be armed. Nothing is armed afterwards in that case.
    pub fn arm(
        &mut self,
        scheduler: &dyn Scheduler,
        zip: ZipFactor,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerFault> {
        self.disarm(scheduler)?;
        let interval_ms = zip.tic_interval_ms();
        let id = scheduler.arm_repeating(Duration::from_millis(interval_ms), callback)?;
        self.armed = Some(id);
        self.interval_ms = interval_ms;
        debug!(timer = id.get(), interval_ms, %zip, "Tic timer armed");
        Ok(id)
    }

    /// Cancel the tic timer. Does nothing when no timer is armed.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the scheduler fails to cancel.
    pub fn disarm(&mut self, scheduler: &dyn Scheduler) -> Result<(), TimerFault> {
        if let Some(id) = self.armed.take() {
            scheduler.cancel(id)?;
            debug!(timer = id.get(), "Tic timer disarmed");
        }
        Ok(())
    }

    /// Whether a tic timer is currently armed.
    pub const fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Interval of the armed timer in wall milliseconds.
    pub const fn interval_ms(&self) -> Option<u64> {
        if self.armed.is_some() {
            Some(self.interval_ms)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::manual::{ManualClock, ManualScheduler};

    fn setup() -> (ManualScheduler, Arc<AtomicUsize>, TimerCallback) {
        let scheduler = ManualScheduler::new(Arc::new(ManualClock::new(0)));
        let count = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&count);
        let callback: TimerCallback = Arc::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        (scheduler, count, callback)
    }

    #[test]
    fn interval_follows_zip() {
        let (scheduler, count, callback) = setup();
        let mut tics = TicScheduler::new();
        tics.arm(&scheduler, ZipFactor::new(4), callback).unwrap();
        assert_eq!(tics.interval_ms(), Some(900_000));

        scheduler.advance(899_999);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.advance(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scheduler.advance(1_800_000);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rearming_replaces_the_old_timer() {
        let (scheduler, count, callback) = setup();
        let mut tics = TicScheduler::new();
        tics.arm(&scheduler, ZipFactor::ONE, Arc::clone(&callback))
            .unwrap();
        tics.arm(&scheduler, ZipFactor::new(2), callback).unwrap();
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(3_600_000);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disarm_is_idempotent() {
        let (scheduler, count, callback) = setup();
        let mut tics = TicScheduler::new();
        tics.disarm(&scheduler).unwrap();
        tics.arm(&scheduler, ZipFactor::ONE, callback).unwrap();
        tics.disarm(&scheduler).unwrap();
        tics.disarm(&scheduler).unwrap();
        assert!(!tics.is_armed());
        assert_eq!(tics.interval_ms(), None);

        scheduler.advance(10 * 3_600_000);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
