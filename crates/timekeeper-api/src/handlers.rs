//! Read and property endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/time` | Current virtual time, offset, zip and status |
//! | `GET` | `/api/properties` | Start date, zip and status |
//! | `PUT` | `/api/properties` | Partial update; re-runs init |
//! | `GET` | `/api/daylight` | Last day/night flag and next check |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use timekeeper_types::{PropertiesUpdate, TimeStatus};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for `GET /api/time`.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeResponse {
    /// Virtual time in epoch milliseconds.
    pub timestamp: i64,
    /// Timezone offset in whole hours at that time.
    pub tz_offset_hours: i32,
    /// Compression factor.
    pub zip: u32,
    /// Current status.
    pub status: TimeStatus,
}

// ---------------------------------------------------------------------------
// GET /api/time
// ---------------------------------------------------------------------------

/// Report the current virtual time.
pub async fn get_time(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tic = state.keeper.snapshot();
    Json(TimeResponse {
        timestamp: tic.timestamp(),
        tz_offset_hours: tic.tz_offset_hours(),
        zip: tic.zip(),
        status: tic.status(),
    })
}

// ---------------------------------------------------------------------------
// GET/PUT /api/properties
// ---------------------------------------------------------------------------

/// Report start date, zip and status.
pub async fn get_properties(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.keeper.properties())
}

/// Apply a partial property update and re-initialize the clock.
///
/// Unparsable start dates and unknown timezones are not rejected; the
/// clock falls back (start 0, UTC) exactly as it does for the config file.
pub async fn put_properties(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PropertiesUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(update) = body.map_err(|rejection| ApiError::BadRequest {
        message: rejection.body_text(),
    })?;
    info!(?update, "Property update requested");
    let props = state.keeper.set_properties(&update)?;
    Ok(Json(props))
}

// ---------------------------------------------------------------------------
// GET /api/daylight
// ---------------------------------------------------------------------------

/// Report the last day/night flag and when the next check is due.
pub async fn get_daylight(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.keeper.daylight())
}
