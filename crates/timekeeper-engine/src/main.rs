//! Timekeeper engine binary.
//!
//! Wires the virtual clock to its outer surfaces: the HTTP/`WebSocket`
//! control API and the NATS event publisher. Runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `timekeeper-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the clock on the Tokio scheduler and system wall clock
//! 4. Connect the NATS publisher (unless disabled)
//! 5. Start the control API server
//! 6. Bring the clock up
//! 7. Wait for `Ctrl-C`, then shut everything down

mod error;
mod nats_publisher;

use std::path::Path;
use std::sync::Arc;

use timekeeper_api::server::ServerConfig;
use timekeeper_api::startup::spawn_api;
use timekeeper_api::state::AppState;
use timekeeper_core::Timekeeper;
use timekeeper_core::config::{LogFormat, LoggingConfig, TimekeeperConfig};
use timekeeper_core::sink::{BroadcastSink, EventSink};
use timekeeper_core::timer::{Scheduler, TokioScheduler};
use timekeeper_core::wall::SystemClock;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::nats_publisher::NatsPublisher;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "timekeeper-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, NATS, or the API server cannot be
/// brought up.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration (logging depends on it).
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("timekeeper-engine starting");
    if !from_file {
        info!(path = CONFIG_PATH, "Config file not found, using defaults");
    }
    info!(
        start_date = %config.clock.start_date,
        zip_factor = %config.clock.zip_factor,
        timezone = %config.clock.timezone_name,
        latitude = config.location.latitude,
        longitude = config.location.longitude,
        "Configuration loaded"
    );

    // 3. Build the clock.
    let sink = BroadcastSink::default();
    let scheduler = TokioScheduler::current().map_err(EngineError::from)?;
    let keeper = Timekeeper::new(
        &config,
        Arc::new(scheduler) as Arc<dyn Scheduler>,
        Arc::new(SystemClock),
        Arc::new(sink.clone()) as Arc<dyn EventSink>,
    );

    let (stop_tx, stop_rx) = watch::channel(false);

    // 4. NATS publisher. Subscribe before the clock comes up so the Init
    //    tic is published too.
    let infra = &config.infrastructure;
    let publisher_handle = if infra.nats_enabled {
        let publisher = NatsPublisher::connect(&infra.nats_url, &infra.nats_subject_prefix).await?;
        Some(tokio::spawn(publisher.run(sink.subscribe(), stop_rx.clone())))
    } else {
        info!("NATS publishing disabled");
        None
    };

    // 5. Control API.
    let state = Arc::new(AppState::new(keeper.clone(), &sink));
    let server_config = ServerConfig {
        host: infra.api_host.clone(),
        port: infra.api_port,
    };
    let api_handle =
        spawn_api(server_config, state, stop_rx).map_err(|e| EngineError::Api {
            message: e.to_string(),
        })?;

    // 6. Bring the clock up.
    let tic = keeper.start().map_err(EngineError::from)?;
    info!(
        clock_id = %keeper.id(),
        status = %tic.status(),
        timestamp = tic.timestamp(),
        "Clock started"
    );

    // 7. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    keeper.shutdown();
    if stop_tx.send(true).is_err() {
        warn!("No task was listening for shutdown");
    }
    if let Err(e) = api_handle.await {
        warn!(error = %e, "Control API task failed");
    }
    if let Some(handle) = publisher_handle {
        let result = handle.await;
        if let Err(e) = result {
            warn!(error = %e, "NATS publisher task failed");
        }
    }

    info!("timekeeper-engine shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Load the configuration from [`CONFIG_PATH`], or defaults with
/// environment overrides when the file does not exist.
///
/// The flag is `true` when the file was read.
fn load_config() -> Result<(TimekeeperConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        let config = TimekeeperConfig::from_file(config_path)?;
        Ok((config, true))
    } else {
        let mut config = TimekeeperConfig::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok((config, false))
    }
}
