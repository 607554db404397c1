//! Wall-clock source.
//!
//! Everything that needs "now" in the clock engine asks a [`WallClock`]
//! rather than calling `Utc::now()` directly, so a deterministic source
//! (see [`ManualClock`](crate::manual::ManualClock)) can drive the same
//! code in tests and offline simulations.

use chrono::Utc;

/// Source of wall-clock time in epoch milliseconds.
pub trait WallClock: Send + Sync {
    /// Current wall-clock time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
