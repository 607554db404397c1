//! Enumeration types for the Timekeeper clock engine.
//!
//! Both enums serialize to the upper-case names downstream consumers
//! already match on (`RUNNING`, `CARRYON`, ...).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Clock status
// ---------------------------------------------------------------------------

/// The single persistent mode of a clock. Exactly one is current at any
/// instant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum TimeStatus {
    /// Configured but never initialized.
    #[default]
    Unknown,
    /// Initialized and waiting for a start command.
    Initialized,
    /// Virtual time is advancing.
    Running,
    /// Paused; virtual time is frozen until resumed.
    Idle,
    /// Stopped; virtual time is frozen until re-initialized.
    Stopped,
}

impl TimeStatus {
    /// Upper-case name used on the wire and in property snapshots.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Initialized => "INITIALIZED",
            Self::Running => "RUNNING",
            Self::Idle => "IDLE",
            Self::Stopped => "STOPPED",
        }
    }

    /// Whether virtual time is frozen at the value held when leaving
    /// [`TimeStatus::Running`].
    pub const fn is_frozen(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

impl core::fmt::Display for TimeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time commands
// ---------------------------------------------------------------------------

/// The transition (or periodic firing) that produced a [`Tic`](crate::Tic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TimeCommand {
    /// The clock was (re-)initialized.
    #[serde(rename = "INIT")]
    Init,
    /// Virtual time started running.
    #[serde(rename = "START")]
    Start,
    /// Virtual time was paused.
    #[serde(rename = "PAUSE")]
    Pause,
    /// Virtual time resumed after a pause.
    #[serde(rename = "RESUME")]
    Resume,
    /// Virtual time was stopped.
    #[serde(rename = "STOP")]
    Stop,
    /// Periodic firing or re-announcement with no state change.
    #[serde(rename = "CARRYON")]
    CarryOn,
}

impl TimeCommand {
    /// Upper-case name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Start => "START",
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Stop => "STOP",
            Self::CarryOn => "CARRYON",
        }
    }
}

impl core::fmt::Display for TimeCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&TimeStatus::Running).unwrap(), "\"RUNNING\"");
        assert_eq!(
            serde_json::to_string(&TimeStatus::Initialized).unwrap(),
            "\"INITIALIZED\""
        );
    }

    #[test]
    fn status_wire_name_matches_display() {
        for status in [
            TimeStatus::Unknown,
            TimeStatus::Initialized,
            TimeStatus::Running,
            TimeStatus::Idle,
            TimeStatus::Stopped,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn carry_on_has_no_separator() {
        assert_eq!(serde_json::to_string(&TimeCommand::CarryOn).unwrap(), "\"CARRYON\"");
        let parsed: TimeCommand = serde_json::from_str("\"CARRYON\"").unwrap();
        assert_eq!(parsed, TimeCommand::CarryOn);
    }

    #[test]
    fn only_idle_and_stopped_are_frozen() {
        assert!(TimeStatus::Idle.is_frozen());
        assert!(TimeStatus::Stopped.is_frozen());
        assert!(!TimeStatus::Running.is_frozen());
        assert!(!TimeStatus::Initialized.is_frozen());
    }

    #[test]
    fn default_status_is_unknown() {
        assert_eq!(TimeStatus::default(), TimeStatus::Unknown);
    }
}
