//! Outbound event delivery.
//!
//! The clock hands every tic and daylight notification to an
//! [`EventSink`]. Sinks are called while the clock's state lock is held,
//! so they must not block and must not call back into the clock.
//!
//! - [`BroadcastSink`] -- fans events out over a Tokio broadcast channel
//!   to any number of subscribers (WebSocket clients, the NATS publisher).
//! - [`RecordingSink`] -- keeps every event in memory, for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use timekeeper_types::{ClockEvent, DaylightNotification, Tic};
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast buffer: subscribers more than this many events behind
/// start losing the oldest ones.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Receiver of clock events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block.
    fn emit(&self, event: ClockEvent);
}

/// Sink publishing to a Tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<ClockEvent>,
}

impl BroadcastSink {
    /// Create a sink with a buffer of `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.sender.subscribe()
    }

    /// The underlying sender, for sharing with other components.
    pub fn sender(&self) -> broadcast::Sender<ClockEvent> {
        self.sender.clone()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: ClockEvent) {
        // No subscribers is normal before the first client connects.
        if self.sender.send(event).is_err() {
            trace!("Clock event dropped: no subscribers");
        }
    }
}

/// Sink keeping every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ClockEvent>>,
}

impl RecordingSink {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ClockEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every event recorded so far, in emission order.
    pub fn events(&self) -> Vec<ClockEvent> {
        self.lock().clone()
    }

    /// Recorded tics, in emission order.
    pub fn tics(&self) -> Vec<Tic> {
        self.lock()
            .iter()
            .filter_map(ClockEvent::as_tic)
            .copied()
            .collect()
    }

    /// Recorded daylight notifications, in emission order.
    pub fn daylight(&self) -> Vec<DaylightNotification> {
        self.lock()
            .iter()
            .filter_map(ClockEvent::as_daylight)
            .cloned()
            .collect()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<ClockEvent> {
        std::mem::take(&mut *self.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ClockEvent) {
        self.lock().push(event);
    }
}
