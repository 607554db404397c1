//! NATS fan-out of clock events.
//!
//! Every [`ClockEvent`] the clock emits is published as JSON on one of two
//! subjects under the configured prefix:
//!
//! - `{prefix}.tic` -- periodic and transition tics
//! - `{prefix}.daylight` -- day/night notifications
//!
//! The publisher reads from the clock's broadcast channel, so a slow or
//! unreachable NATS server never holds up the clock itself.

use std::time::Duration;

use timekeeper_types::ClockEvent;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// Subject suffix for tics.
const TIC_SUBJECT: &str = "tic";

/// Subject suffix for daylight notifications.
const DAYLIGHT_SUBJECT: &str = "daylight";

/// How long shutdown waits for buffered events to reach the server.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Subject `event` is published on.
pub fn subject_for(prefix: &str, event: &ClockEvent) -> String {
    let suffix = match event {
        ClockEvent::Tic(_) => TIC_SUBJECT,
        ClockEvent::Daylight(_) => DAYLIGHT_SUBJECT,
    };
    format!("{prefix}.{suffix}")
}

/// Publishes clock events to NATS.
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    /// Publish through an existing client.
    pub fn new(client: async_nats::Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_owned(),
        }
    }

    /// Connect to the NATS server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, EngineError> {
        info!(url = url, "Connecting to NATS");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| EngineError::Nats {
                message: format!("failed to connect to {url}: {e}"),
            })?;
        info!(prefix = prefix, "NATS publisher connected");
        Ok(Self::new(client, prefix))
    }

    /// Publish one event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the event cannot be serialized or
    /// the publish fails.
    pub async fn publish(&self, event: &ClockEvent) -> Result<(), EngineError> {
        let subject = subject_for(&self.prefix, event);
        let payload = serde_json::to_vec(event).map_err(|e| EngineError::Nats {
            message: format!("failed to serialize event: {e}"),
        })?;
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| EngineError::Nats {
                message: format!("failed to publish on {subject}: {e}"),
            })?;
        debug!(subject = subject, timestamp = event.timestamp(), "Event published");
        Ok(())
    }

    /// Forward events from `events` until `shutdown` reads `true`, its
    /// sender goes away, or the channel closes. Then flush, giving up after
    /// [`FLUSH_TIMEOUT`].
    ///
    /// Publish failures are logged and the event dropped; the loop keeps
    /// going.
    pub async fn run(
        self,
        mut events: broadcast::Receiver<ClockEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        while !*shutdown.borrow_and_update() {
            tokio::select! {
                result = events.recv() => {
                    match result {
                        Ok(event) => {
                            if let Err(e) = self.publish(&event).await {
                                warn!(error = %e, "Dropping clock event");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "NATS publisher lagged, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        match tokio::time::timeout(FLUSH_TIMEOUT, self.client.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to flush NATS client"),
            Err(_) => warn!("Timed out flushing NATS client"),
        }
        info!("NATS publisher stopped");
    }
}
