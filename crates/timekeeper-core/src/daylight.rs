//! Day/night transition tracking.
//!
//! Each check computes sunrise and sunset for the solar days around the
//! local calendar date of the current virtual time, compares the resulting
//! daytime flag with the last one seen, and works out how far away the next
//! transition is. The owner arms a one-shot timer for that distance
//! (converted to wall time) which runs the next check, so the chain keeps
//! itself going for as long as the clock runs.
//!
//! A location's solar day need not line up with the configured timezone's
//! calendar day (Sydney seen from UTC rises on the previous UTC date), so
//! daytime is the union of the neighbouring days' `[sunrise, sunset)`
//! windows and the next transition is always strictly in the future.
//!
//! # Design Principles
//!
//! - Durations are computed in virtual milliseconds and only converted to
//!   wall milliseconds at the very end, by dividing by the zip factor.
//! - A notification is produced only on a change of flag, or on the very
//!   first check.
//! - At most one follow-up check is pending at any time.

use std::time::Duration;

use timekeeper_types::DaylightNotification;
use tracing::debug;

use crate::clock::{DAY_MS, ZipFactor};
use crate::solar::{GeoLocation, SunTimes, local_day, sun_times};
use crate::timer::{Scheduler, TimerCallback, TimerFault, TimerId};

/// Solar days before the local date whose window may still be open.
const DAYS_BEHIND: i64 = 1;

/// Solar days after the local date searched for the next transition.
const DAYS_AHEAD: i64 = 3;

/// Outcome of one daylight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaylightCheck {
    /// Notification to publish, if the daytime flag changed.
    pub notification: Option<DaylightNotification>,
    /// Whether the checked instant is daytime.
    pub is_daytime: bool,
    /// Virtual milliseconds until the next transition.
    pub delay_virtual_ms: i64,
    /// Virtual time at which the next check is due.
    pub next_check_virtual_ms: i64,
    /// Sun times of the local date that was checked.
    pub sun: SunTimes,
}

impl DaylightCheck {
    /// Wall-clock delay until the next check under `zip`, never below one
    /// millisecond.
    pub fn wall_delay(&self, zip: ZipFactor) -> Duration {
        let wall_ms = zip.to_wall_ms(self.delay_virtual_ms).max(1);
        Duration::from_millis(u64::try_from(wall_ms).unwrap_or(1))
    }
}

/// Day/night state for one fixed location.
#[derive(Debug)]
pub struct DaylightTracker {
    location: GeoLocation,
    is_daytime: Option<bool>,
    next_check_virtual_ms: Option<i64>,
    pending: Option<TimerId>,
}

impl DaylightTracker {
    /// A tracker that has not yet run a check.
    pub const fn new(location: GeoLocation) -> Self {
        Self {
            location,
            is_daytime: None,
            next_check_virtual_ms: None,
            pending: None,
        }
    }

    /// The observed location.
    pub const fn location(&self) -> GeoLocation {
        self.location
    }

    /// The last daytime flag, `None` before the first check.
    pub const fn is_daytime(&self) -> Option<bool> {
        self.is_daytime
    }

    /// Virtual time of the next scheduled check, `None` before the first
    /// check.
    pub const fn next_check_virtual_ms(&self) -> Option<i64> {
        self.next_check_virtual_ms
    }

    /// Whether a follow-up check is armed.
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Evaluate the daytime flag at `virtual_now` and record it.
    ///
    /// `tz_offset_hours` selects the local calendar date whose sunrise and
    /// sunset apply.
    pub fn check(&mut self, virtual_now: i64, tz_offset_hours: i32) -> DaylightCheck {
        let day = local_day(virtual_now, tz_offset_hours);
        let sun = sun_times(self.location, day);
        let windows: Vec<SunTimes> = (day.saturating_sub(DAYS_BEHIND)
            ..=day.saturating_add(DAYS_AHEAD))
            .map(|d| sun_times(self.location, d))
            .collect();

        let is_daytime = daytime_at(&windows, virtual_now);
        let next_check_virtual_ms = next_transition(&windows, virtual_now, is_daytime);
        let delay_virtual_ms = next_check_virtual_ms.saturating_sub(virtual_now);

        let notification = if self.is_daytime == Some(is_daytime) {
            None
        } else {
            Some(DaylightNotification::new(is_daytime, virtual_now))
        };
        self.is_daytime = Some(is_daytime);
        self.next_check_virtual_ms = Some(next_check_virtual_ms);

        DaylightCheck {
            notification,
            is_daytime,
            delay_virtual_ms,
            next_check_virtual_ms,
            sun,
        }
    }

    /// Arm the follow-up check, replacing any pending one.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the timer cannot be armed.
    pub fn schedule(
        &mut self,
        scheduler: &dyn Scheduler,
        delay: Duration,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerFault> {
        self.cancel(scheduler)?;
        let id = scheduler.arm_once(delay, callback)?;
        self.pending = Some(id);
        debug!(timer = id.get(), delay_ms = delay.as_millis(), "Daylight check scheduled");
        Ok(id)
    }

    /// Forget the pending check because it has just fired.
    pub const fn fired(&mut self) {
        self.pending = None;
    }

    /// Cancel the pending check, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TimerFault`] if the scheduler fails to cancel.
    pub fn cancel(&mut self, scheduler: &dyn Scheduler) -> Result<(), TimerFault> {
        if let Some(id) = self.pending.take() {
            scheduler.cancel(id)?;
            debug!(timer = id.get(), "Daylight check cancelled");
        }
        Ok(())
    }
}

/// Whether `at` lies in any of the `[sunrise, sunset)` windows.
fn daytime_at(windows: &[SunTimes], at: i64) -> bool {
    windows.iter().any(|sun| sun.is_daytime(at))
}

/// First sunrise or sunset after `now` at which the flag differs from
/// `is_daytime`.
///
/// Polar day and night have no such event in range; the next check then
/// runs at the last event considered, which is still days ahead.
fn next_transition(windows: &[SunTimes], now: i64, is_daytime: bool) -> i64 {
    let mut events: Vec<i64> = windows
        .iter()
        .flat_map(|sun| [sun.sunrise_ms, sun.sunset_ms])
        .filter(|&at| at > now)
        .collect();
    events.sort_unstable();

    events
        .iter()
        .copied()
        .find(|&at| daytime_at(windows, at) != is_daytime)
        .or_else(|| events.last().copied())
        .unwrap_or_else(|| now.saturating_add(DAY_MS))
}
