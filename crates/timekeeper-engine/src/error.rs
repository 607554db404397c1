//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and shutdown.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: timekeeper_core::config::ConfigError,
    },

    /// The clock could not arm or cancel its timers.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: timekeeper_core::TimekeeperError,
    },

    /// No timer runtime was available for the scheduler.
    #[error("timer error: {source}")]
    Timer {
        /// The underlying timer fault.
        #[from]
        source: timekeeper_core::timer::TimerFault,
    },

    /// NATS connection or messaging failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },

    /// Control API server failed to start.
    #[error("API error: {message}")]
    Api {
        /// Description of the API failure.
        message: String,
    },
}
