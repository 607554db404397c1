//! `WebSocket` stream of clock events.
//!
//! `GET /ws/events` upgrades to a `WebSocket` that carries every
//! [`ClockEvent`] as one JSON text frame, in emission order. The
//! subscription is taken while the upgrade request is handled, so an event
//! emitted between the handshake and the first poll is not lost.
//!
//! The stream is one-way. Client frames other than ping and close are
//! ignored; a client that lags behind the broadcast buffer skips to the
//! newest event.

use std::ops::ControlFlow;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use timekeeper_types::ClockEvent;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade to a `WebSocket` streaming clock events.
///
/// # Route
///
/// `GET /ws/events`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let events = state.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, events))
}

/// Encode `event` as a text frame.
pub fn event_frame(event: &ClockEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!(error = %e, "Failed to serialize clock event");
            None
        }
    }
}

async fn stream_events(mut socket: WebSocket, mut events: Receiver<ClockEvent>) {
    debug!("WebSocket client connected");
    loop {
        let flow = tokio::select! {
            received = events.recv() => forward(&mut socket, received).await,
            incoming = socket.recv() => reply(&mut socket, incoming).await,
        };
        if flow.is_break() {
            debug!("WebSocket stream closed");
            return;
        }
    }
}

/// Push one broadcast result to the client.
async fn forward(
    socket: &mut WebSocket,
    received: Result<ClockEvent, RecvError>,
) -> ControlFlow<()> {
    match received {
        Ok(event) => {
            let Some(frame) = event_frame(&event) else {
                return ControlFlow::Continue(());
            };
            if socket.send(frame).await.is_err() {
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        }
        Err(RecvError::Lagged(skipped)) => {
            debug!(skipped, "WebSocket client lagged");
            ControlFlow::Continue(())
        }
        Err(RecvError::Closed) => ControlFlow::Break(()),
    }
}

/// React to a frame from the client.
async fn reply(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, axum::Error>>,
) -> ControlFlow<()> {
    match incoming {
        None | Some(Ok(Message::Close(_))) => ControlFlow::Break(()),
        Some(Ok(Message::Ping(payload))) => {
            if socket.send(Message::Pong(payload)).await.is_err() {
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        }
        Some(Err(e)) => {
            debug!(error = %e, "WebSocket receive failed");
            ControlFlow::Break(())
        }
        Some(Ok(_)) => ControlFlow::Continue(()),
    }
}
