//! Control endpoints driving the clock's state machine.
//!
//! Every endpoint answers with a [`ControlResponse`]. A call the clock
//! refuses in its current state (pausing a clock that is not running, any
//! pause/resume/stop in pass-through mode) is answered with `ok: false`
//! and HTTP 409; the clock is left untouched.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/time/init` | Re-initialize (cancels all timers) |
//! | `POST` | `/api/time/start` | Start from `INITIALIZED` |
//! | `POST` | `/api/time/pause` | Pause a running clock |
//! | `POST` | `/api/time/resume` | Resume a paused clock |
//! | `POST` | `/api/time/stop` | Stop a running or paused clock |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use timekeeper_core::TimekeeperError;
use timekeeper_types::{Tic, TimeCommand, TimeStatus};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body of every control endpoint.
#[derive(Debug, serde::Serialize)]
pub struct ControlResponse {
    /// Whether the call was carried out.
    pub ok: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Status after the call.
    pub status: TimeStatus,
    /// Virtual time after the call, in epoch milliseconds.
    pub timestamp: i64,
}

/// Shape the outcome of `command` into a response.
///
/// An accepted call reports the state carried by its own tic; a rejected
/// one reports the unchanged clock.
fn respond(
    state: &AppState,
    command: TimeCommand,
    result: Result<Tic, TimekeeperError>,
) -> Result<Response, ApiError> {
    let keeper = &state.keeper;
    match result {
        Ok(tic) => {
            info!(%command, status = %tic.status(), "Control call accepted");
            let body = ControlResponse {
                ok: true,
                message: format!("{command} accepted"),
                status: tic.status(),
                timestamp: tic.timestamp(),
            };
            Ok(Json(body).into_response())
        }
        Err(TimekeeperError::Rejected { source }) => {
            let body = ControlResponse {
                ok: false,
                message: source.to_string(),
                status: keeper.status(),
                timestamp: keeper.time(),
            };
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        Err(TimekeeperError::Timer { source }) => Err(ApiError::Timer { source }),
    }
}

// ---------------------------------------------------------------------------
// POST /api/time/{init,start,pause,resume,stop}
// ---------------------------------------------------------------------------

/// Re-initialize the clock.
pub async fn init(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    respond(&state, TimeCommand::Init, state.keeper.init())
}

/// Start the clock.
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    respond(&state, TimeCommand::Start, state.keeper.start_time())
}

/// Pause the clock.
pub async fn pause(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    respond(&state, TimeCommand::Pause, state.keeper.pause_time())
}

/// Resume the clock.
pub async fn resume(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    respond(&state, TimeCommand::Resume, state.keeper.resume_time())
}

/// Stop the clock.
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    respond(&state, TimeCommand::Stop, state.keeper.stop_time())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use timekeeper_core::config::TimekeeperConfig;
    use timekeeper_core::manual::{ManualClock, ManualScheduler};
    use timekeeper_core::sink::{BroadcastSink, EventSink};
    use timekeeper_core::timer::Scheduler;
    use timekeeper_core::Timekeeper;

    use super::*;

    fn state() -> AppState {
        let mut config = TimekeeperConfig::default();
        config.clock.start_date = "2024-01-01 00:00:00".to_owned();
        config.clock.timezone_name = "UTC".to_owned();
        let clock = Arc::new(ManualClock::new(0));
        let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
        let sink = Arc::new(BroadcastSink::new(8));
        let keeper = Timekeeper::new(
            &config,
            scheduler as Arc<dyn Scheduler>,
            clock,
            Arc::clone(&sink) as Arc<dyn EventSink>,
        );
        keeper.init().unwrap();
        AppState::new(keeper, &sink)
    }

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn accepted_call_reports_its_own_tic() {
        let state = state();
        // A tic from a call that raced with a later one.
        let tic = Tic::new(42, 7, 3, TimeStatus::Idle, TimeCommand::Pause);

        let response = respond(&state, TimeCommand::Pause, Ok(tic)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["status"], "IDLE");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(state.keeper.status(), TimeStatus::Initialized);
    }

    #[tokio::test]
    async fn rejected_call_reports_the_clock() {
        let state = state();
        let result = state.keeper.pause_time();

        let response = respond(&state, TimeCommand::Pause, result).unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body(response).await;
        assert_eq!(json["ok"], false);
        assert_eq!(json["status"], "INITIALIZED");
        assert_eq!(json["timestamp"], 1_704_067_200_000_i64);
    }
}
