//! Control API for the Timekeeper clock.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Read endpoints** for the current virtual time, clock properties
//!   and day/night state
//! - **Control endpoints** driving the clock's state machine (init,
//!   start, pause, resume, stop)
//! - **`WebSocket` endpoint** (`/ws/events`) streaming every tic and
//!   daylight notification via [`tokio::sync::broadcast`]
//!
//! # Architecture
//!
//! Handlers call straight into the shared [`Timekeeper`]; every call
//! takes the clock's lock only for the duration of the transition, so
//! requests never wait on a timer. Events reach `WebSocket` clients
//! through the same broadcast channel the engine publishes from.
//!
//! [`Timekeeper`]: timekeeper_core::Timekeeper

pub mod control;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
