//! Outbound events published by a clock.
//!
//! A clock emits exactly two kinds of events: a [`Tic`] on every state
//! transition and periodic firing, and a [`DaylightNotification`] whenever
//! the day/night flag flips. Transports carry both inside a [`ClockEvent`]
//! envelope.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{TimeCommand, TimeStatus};

/// Data point key used for day/night transition notifications.
pub const DAYTIME_KEY: &str = "time.dayTime";

// ---------------------------------------------------------------------------
// Tic
// ---------------------------------------------------------------------------

/// Announcement of the current virtual time and clock status.
///
/// Immutable once constructed; fields are only reachable through getters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Tic {
    /// Virtual time in epoch milliseconds (UTC).
    #[ts(type = "number")]
    timestamp: i64,
    /// Compression factor in effect.
    zip: u32,
    /// Timezone offset in whole hours at `timestamp`.
    tz_offset_hours: i32,
    /// Clock status after the transition.
    status: TimeStatus,
    /// Transition or firing that produced this tic.
    command: TimeCommand,
}

impl Tic {
    /// Build a tic.
    pub const fn new(
        timestamp: i64,
        zip: u32,
        tz_offset_hours: i32,
        status: TimeStatus,
        command: TimeCommand,
    ) -> Self {
        Self {
            timestamp,
            zip,
            tz_offset_hours,
            status,
            command,
        }
    }

    /// Virtual time in epoch milliseconds.
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Compression factor in effect.
    pub const fn zip(&self) -> u32 {
        self.zip
    }

    /// Timezone offset in whole hours.
    pub const fn tz_offset_hours(&self) -> i32 {
        self.tz_offset_hours
    }

    /// Clock status after the transition.
    pub const fn status(&self) -> TimeStatus {
        self.status
    }

    /// Command that produced this tic.
    pub const fn command(&self) -> TimeCommand {
        self.command
    }
}

impl core::fmt::Display for Tic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "tic ts={} zip={} tz={} status={} command={}",
            self.timestamp, self.zip, self.tz_offset_hours, self.status, self.command
        )
    }
}

// ---------------------------------------------------------------------------
// Daylight notification
// ---------------------------------------------------------------------------

/// Day/night transition, shaped as a context data point
/// (`key`, `timestamp`, string `value`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DaylightNotification {
    /// Always [`DAYTIME_KEY`].
    pub key: String,
    /// Virtual time of the check that observed the transition.
    #[ts(type = "number")]
    pub timestamp: i64,
    /// `"true"` during the day, `"false"` at night.
    pub value: String,
}

impl DaylightNotification {
    /// Build a notification for the given flag at the given virtual time.
    pub fn new(is_daytime: bool, timestamp: i64) -> Self {
        Self {
            key: DAYTIME_KEY.to_owned(),
            timestamp,
            value: is_daytime.to_string(),
        }
    }

    /// Whether the notification announces daytime.
    pub fn is_daytime(&self) -> bool {
        self.value == "true"
    }
}

/// Current day/night knowledge of a clock, as reported by the control API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct DaylightState {
    /// Last observed flag, `None` before the first check.
    pub is_daytime: Option<bool>,
    /// Virtual time of the next scheduled check, `None` before the first
    /// check.
    #[ts(type = "number | null")]
    pub next_check_virtual_time: Option<i64>,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Envelope for everything a clock publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClockEvent {
    /// A tic.
    Tic(Tic),
    /// A day/night transition.
    Daylight(DaylightNotification),
}

impl ClockEvent {
    /// Return the tic if this event carries one.
    pub const fn as_tic(&self) -> Option<&Tic> {
        match self {
            Self::Tic(tic) => Some(tic),
            Self::Daylight(_) => None,
        }
    }

    /// Return the daylight notification if this event carries one.
    pub const fn as_daylight(&self) -> Option<&DaylightNotification> {
        match self {
            Self::Daylight(notification) => Some(notification),
            Self::Tic(_) => None,
        }
    }

    /// Virtual timestamp carried by the event.
    pub const fn timestamp(&self) -> i64 {
        match self {
            Self::Tic(tic) => tic.timestamp,
            Self::Daylight(notification) => notification.timestamp,
        }
    }
}

impl From<Tic> for ClockEvent {
    fn from(tic: Tic) -> Self {
        Self::Tic(tic)
    }
}

impl From<DaylightNotification> for ClockEvent {
    fn from(notification: DaylightNotification) -> Self {
        Self::Daylight(notification)
    }
}
