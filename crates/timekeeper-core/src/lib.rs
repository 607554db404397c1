//! Virtual clock, tic scheduling, and daylight tracking for the Timekeeper.
//!
//! This crate owns the simulated clock: a virtual time line that can run at
//! wall speed or compressed by an integer zip factor, be paused and resumed
//! without drift, and announce itself through periodic tics and day/night
//! transition notifications.
//!
//! # Modules
//!
//! - [`clock`] -- [`VirtualClock`] state machine and wall-to-virtual
//!   conversion, [`ZipFactor`], timezone helpers.
//! - [`tic`] -- [`TicScheduler`], the periodic tic timer.
//! - [`daylight`] -- [`DaylightTracker`], the self-rescheduling day/night
//!   detector.
//! - [`solar`] -- Sunrise and sunset computation.
//! - [`timer`] -- [`Scheduler`] trait and the Tokio-backed implementation.
//! - [`manual`] -- Deterministic [`ManualClock`] and [`ManualScheduler`].
//! - [`wall`] -- [`WallClock`] trait and the system clock.
//! - [`sink`] -- [`EventSink`] trait, broadcast and recording sinks.
//! - [`config`] -- Configuration loading from `timekeeper-config.yaml`.
//! - [`keeper`] -- The [`Timekeeper`] service tying it all together.
//!
//! [`VirtualClock`]: clock::VirtualClock
//! [`ZipFactor`]: clock::ZipFactor
//! [`TicScheduler`]: tic::TicScheduler
//! [`DaylightTracker`]: daylight::DaylightTracker
//! [`Scheduler`]: timer::Scheduler
//! [`ManualClock`]: manual::ManualClock
//! [`ManualScheduler`]: manual::ManualScheduler
//! [`WallClock`]: wall::WallClock
//! [`EventSink`]: sink::EventSink
//! [`Timekeeper`]: keeper::Timekeeper

pub mod clock;
pub mod config;
pub mod daylight;
pub mod keeper;
pub mod manual;
pub mod sink;
pub mod solar;
pub mod tic;
pub mod timer;
pub mod wall;

pub use keeper::{Timekeeper, TimekeeperError};
