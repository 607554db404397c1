//! Control API startup helper for embedding in the engine binary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use timekeeper_api::startup::spawn_api;
//!
//! let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! let handle = spawn_api(config, state, stop_rx)?;
//! // ... later
//! stop_tx.send(true)?;
//! handle.await?;
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, start_server};
use crate::state::AppState;

/// Errors that can occur when spawning the control API.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}

/// Spawn the control API server on a background Tokio task.
///
/// The address is validated before spawning so obvious
/// misconfigurations surface to the caller; bind failures inside the
/// task are logged. The server stops once `shutdown` reads `true`.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address does not
/// parse.
pub fn spawn_api(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, StartupError> {
    let addr = config.addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = start_server(&config, state, shutdown).await {
            tracing::error!(error = %e, "Control API exited with error");
        }
    });

    tracing::info!(%addr, "Control API spawned on background task");

    Ok(handle)
}
