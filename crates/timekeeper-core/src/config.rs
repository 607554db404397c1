//! Configuration loading and typed config structures for the Timekeeper.
//!
//! The canonical configuration lives in `timekeeper-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure and a loader that reads the file. Every field has a
//! default, so a missing section (or a missing file, handled by the binary)
//! yields a pass-through clock in `Europe/London`.

use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::clock::ACTUAL_TIME;
use crate::solar::GeoLocation;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Timekeeper configuration.
///
/// Mirrors the structure of `timekeeper-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TimekeeperConfig {
    /// Start date, compression and timezone of the virtual clock.
    #[serde(default)]
    pub clock: ClockSettings,

    /// Location used for sunrise and sunset.
    #[serde(default)]
    pub location: LocationConfig,

    /// Transport and API endpoints.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TimekeeperConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `NATS_URL` overrides `infrastructure.nats_url`
    /// - `TIMEKEEPER_API_PORT` overrides `infrastructure.api_port`
    /// - `TIMEKEEPER_START_DATE` overrides `clock.start_date`
    /// - `TIMEKEEPER_ZIP` overrides `clock.zip_factor`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override values from `lookup`, which maps a variable name to its
    /// value when set.
    ///
    /// An unparsable `TIMEKEEPER_API_PORT` is ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("NATS_URL") {
            self.infrastructure.nats_url = val;
        }
        if let Some(port) = lookup("TIMEKEEPER_API_PORT").and_then(|val| val.parse().ok()) {
            self.infrastructure.api_port = port;
        }
        if let Some(val) = lookup("TIMEKEEPER_START_DATE") {
            self.clock.start_date = val;
        }
        if let Some(val) = lookup("TIMEKEEPER_ZIP") {
            self.clock.zip_factor = val;
        }
    }
}

/// Virtual clock settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClockSettings {
    /// `actual` for pass-through, or a local `yyyy-MM-dd HH:mm:ss` start.
    #[serde(default = "default_start_date")]
    pub start_date: String,

    /// Compression factor such as `x4` or `4`.
    #[serde(
        default = "default_zip_factor",
        deserialize_with = "string_or_number"
    )]
    pub zip_factor: String,

    /// IANA timezone name the start date is read in.
    #[serde(default = "default_timezone_name")]
    pub timezone_name: String,

    /// Log every periodic tic at `info` instead of `debug`.
    #[serde(default)]
    pub show_tic: bool,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            zip_factor: default_zip_factor(),
            timezone_name: default_timezone_name(),
            show_tic: false,
        }
    }
}

/// Observer location for daylight tracking.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LocationConfig {
    /// Degrees north.
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    /// Degrees east.
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

impl LocationConfig {
    /// The configured point as a [`GeoLocation`].
    pub const fn geo(&self) -> GeoLocation {
        GeoLocation::new(self.latitude, self.longitude)
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

/// Transport and API endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Subject prefix for published events (`{prefix}.tic`,
    /// `{prefix}.daylight`).
    #[serde(default = "default_nats_subject_prefix")]
    pub nats_subject_prefix: String,

    /// Whether to publish events to NATS at all.
    #[serde(default = "default_true")]
    pub nats_enabled: bool,

    /// Address the control API binds to.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Port the control API listens on.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            nats_subject_prefix: default_nats_subject_prefix(),
            nats_enabled: true,
            api_host: default_api_host(),
            api_port: default_api_port(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

/// Accept `x4`, `"4"` or a bare `4` for textual settings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Integer(value) => value.to_string(),
        Scalar::Float(value) => value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_start_date() -> String {
    ACTUAL_TIME.to_owned()
}

fn default_zip_factor() -> String {
    "x1".to_owned()
}

fn default_timezone_name() -> String {
    "Europe/London".to_owned()
}

const fn default_latitude() -> f64 {
    52.041_404
}

const fn default_longitude() -> f64 {
    -0.728_78
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_nats_subject_prefix() -> String {
    "timekeeper".to_owned()
}

const fn default_true() -> bool {
    true
}

fn default_api_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_api_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}
