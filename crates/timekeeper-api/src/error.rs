//! Error types for the control API.
//!
//! [`ApiError`] can be converted into an Axum HTTP response via its
//! [`IntoResponse`] implementation. The control endpoints answer rejected
//! calls with their own `ok: false` body; [`ApiError::Rejected`] covers
//! rejections everywhere else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use timekeeper_core::TimekeeperError;
use timekeeper_core::clock::ControlRejected;
use timekeeper_core::timer::TimerFault;

/// Errors that can occur in the control API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The timer facility failed; the clock may no longer tic.
    #[error("timer fault: {source}")]
    Timer {
        /// The underlying timer fault.
        #[from]
        source: TimerFault,
    },

    /// The clock refused the call in its current state.
    #[error("control rejected: {source}")]
    Rejected {
        /// Why the call was rejected.
        #[from]
        source: ControlRejected,
    },

    /// The request could not be understood.
    #[error("bad request: {message}")]
    BadRequest {
        /// What was wrong with the request.
        message: String,
    },
}

impl From<TimekeeperError> for ApiError {
    fn from(err: TimekeeperError) -> Self {
        match err {
            TimekeeperError::Rejected { source } => Self::Rejected { source },
            TimekeeperError::Timer { source } => Self::Timer { source },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Timer { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Rejected { .. } => StatusCode::CONFLICT,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
