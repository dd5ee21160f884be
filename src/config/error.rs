//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Push URL must use ws:// or wss://")]
    InvalidPushUrl,

    #[error("API base URL must use http:// or https://")]
    InvalidApiUrl,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid polling interval: {0}")]
    InvalidInterval(&'static str),

    #[error("Reconnect delays must be non-zero with base_delay_ms <= max_delay_ms")]
    InvalidReconnectDelays,

    #[error("Heartbeat interval must be non-zero when set")]
    InvalidHeartbeat,

    #[error("Invalid log filter: {0}")]
    InvalidLogLevel(String),
}
