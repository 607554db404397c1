//! Shared application state for the control API.
//!
//! [`AppState`] holds the [`Timekeeper`] the endpoints drive and the
//! broadcast channel its events are published on.

use timekeeper_core::Timekeeper;
use timekeeper_core::sink::BroadcastSink;
use timekeeper_types::ClockEvent;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    /// The clock being controlled.
    pub keeper: Timekeeper,
    /// Broadcast sender the clock's events are published on.
    pub tx: broadcast::Sender<ClockEvent>,
}

impl AppState {
    /// Create the state for `keeper`, whose events go out through `sink`.
    pub fn new(keeper: Timekeeper, sink: &BroadcastSink) -> Self {
        Self {
            keeper,
            tx: sink.sender(),
        }
    }

    /// Subscribe to the clock's event stream.
    ///
    /// Returns a receiver that yields every [`ClockEvent`] emitted from
    /// now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.tx.subscribe()
    }
}
