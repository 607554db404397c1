//! Property snapshot and update payloads for the control surface.
//!
//! [`ClockProperties`] is what `getProperties` reports. [`PropertiesUpdate`]
//! is what `setProperties` accepts; every field is optional and absent
//! fields keep their current value. The update accepts `startDate` as an
//! alias of `start` so a snapshot can be fed straight back in.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::TimeStatus;

/// Snapshot of a clock's configuration and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClockProperties {
    /// Virtual start time in epoch milliseconds, `-1` in pass-through mode.
    #[serde(rename = "startDate")]
    #[ts(type = "number")]
    pub start_date: i64,
    /// Compression factor.
    pub zip: u32,
    /// Current status.
    pub status: TimeStatus,
}

/// A start time given either as a local date string or as epoch millis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartValue {
    /// UTC epoch milliseconds; `-1` selects pass-through mode.
    Timestamp(i64),
    /// `yyyy-MM-dd HH:mm:ss` in the clock's timezone, or `actual`.
    Text(String),
}

/// A compression factor given either as a number or as text (`"x4"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZipValue {
    /// Numeric factor; fractional parts are truncated.
    Number(f64),
    /// Textual factor with an optional leading `x`.
    Text(String),
}

/// Partial update applied by `setProperties`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertiesUpdate {
    /// IANA timezone name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// New start time.
    #[serde(default, alias = "startDate", skip_serializing_if = "Option::is_none")]
    pub start: Option<StartValue>,
    /// New compression factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<ZipValue>,
}

impl From<ClockProperties> for PropertiesUpdate {
    fn from(props: ClockProperties) -> Self {
        Self {
            timezone: None,
            start: Some(StartValue::Timestamp(props.start_date)),
            zip: Some(ZipValue::Number(f64::from(props.zip))),
        }
    }
}
