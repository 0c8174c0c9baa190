//! Birdwire Telemetry - logging setup for stream consumers
//!
//! - **Structured Logging**: pretty or JSON output via `tracing-subscriber`
//! - **Redaction**: scrub credential-bearing fields before they reach a log
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use birdwire_telemetry::{TelemetryConfig, init_telemetry};
//!
//! init_telemetry(&TelemetryConfig::new("birdwire-twitter").with_json_logs(false))?;
//! tracing::info!(service = "birdwire-twitter", "Starting up");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod logging;

pub use logging::*;

use serde::Deserialize;

/// Configuration for telemetry initialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event.
    pub service_name: String,

    /// Log level filter (e.g., "info", "debug", "trace"). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable JSON log output.
    pub json_logs: bool,

    /// Fields to redact from logged JSON payloads.
    pub redact_fields: Vec<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "birdwire".to_string(),
            log_level: "info".to_string(),
            json_logs: true,
            redact_fields: vec![
                "secret".to_string(),
                "token".to_string(),
                "authorization".to_string(),
                "consumer_key".to_string(),
            ],
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable or disable JSON logs.
    #[must_use]
    pub const fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// Add fields to redact from logs.
    #[must_use]
    pub fn with_redact_fields(mut self, fields: Vec<String>) -> Self {
        self.redact_fields.extend(fields);
        self
    }
}

/// Initialize logging.
///
/// Call once at startup.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggingInit`] if a global subscriber is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    init_logging(config)?;
    tracing::debug!(service = %config.service_name, "Telemetry initialized");
    Ok(())
}

/// Telemetry error type.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}
