//! Axum router construction for the control API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{control, handlers, ws};

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /api/time` -- current virtual time
/// - `POST /api/time/{init,start,pause,resume,stop}` -- clock control
/// - `GET /api/properties`, `PUT /api/properties` -- clock properties
/// - `GET /api/daylight` -- day/night state
/// - `GET /ws/events` -- `WebSocket` event stream
///
/// CORS allows any origin so a browser dashboard on another port can
/// drive the clock.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/events", get(ws::ws_events))
        .route("/api/time", get(handlers::get_time))
        .route("/api/time/init", post(control::init))
        .route("/api/time/start", post(control::start))
        .route("/api/time/pause", post(control::pause))
        .route("/api/time/resume", post(control::resume))
        .route("/api/time/stop", post(control::stop))
        .route(
            "/api/properties",
            get(handlers::get_properties).put(handlers::put_properties),
        )
        .route("/api/daylight", get(handlers::get_daylight))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
