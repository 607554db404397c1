//! Shared type definitions for the Timekeeper clock engine.
//!
//! Every consumer of the clock (control API, transports, downstream
//! services) speaks in terms of these types. Types flow to `TypeScript`
//! via `ts-rs` for dashboard clients.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier for a clock instance
//! - [`enums`] -- Clock status and time command enumerations
//! - [`events`] -- Outbound events: [`Tic`], [`DaylightNotification`], [`ClockEvent`]
//! - [`properties`] -- Property snapshot and update payloads

pub mod enums;
pub mod events;
pub mod ids;
pub mod properties;

pub use enums::{TimeCommand, TimeStatus};
pub use events::{ClockEvent, DAYTIME_KEY, DaylightNotification, DaylightState, Tic};
pub use ids::ClockId;
pub use properties::{ClockProperties, PropertiesUpdate, StartValue, ZipValue};
