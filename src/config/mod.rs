//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `NEURO_PULSE` prefix and nested values use double underscores as separators.
//! Every value has a default, so an empty environment yields a client pointed
//! at `localhost:8000`.
//!
//! # Example
//!
//! ```no_run
//! use neuro_pulse_sync::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Push channel at {}", config.push.url);
//! ```

mod api;
mod error;
mod polling;
mod push;
mod telemetry;

pub use api::ApiConfig;
pub use error::{ConfigError, ValidationError};
pub use polling::PollingConfig;
pub use push::PushConfig;
pub use telemetry::{Environment, TelemetryConfig};

use serde::Deserialize;

use crate::application::{ConnectionSettings, SessionSettings};

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Push channel (WebSocket endpoint, reconnection policy)
    #[serde(default)]
    pub push: PushConfig,

    /// REST case API (base URL, request timeout)
    #[serde(default)]
    pub api: ApiConfig,

    /// Poll intervals
    #[serde(default)]
    pub polling: PollingConfig,

    /// Environment and logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `NEURO_PULSE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `NEURO_PULSE__PUSH__URL=ws://...` -> `push.url = ws://...`
    /// - `NEURO_PULSE__POLLING__CASES_INTERVAL_SECS=60` -> `polling.cases_interval_secs = 60`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("NEURO_PULSE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.push.validate()?;
        self.api.validate()?;
        self.polling.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.telemetry.is_production()
    }

    /// Build the session settings the sync components run with.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            connection: ConnectionSettings {
                url: self.push.url.clone(),
                enabled: self.push.enabled,
                policy: self.push.reconnect_policy(),
                heartbeat: self.push.heartbeat(),
                diagnostic_mode: self.telemetry.diagnostic_mode(),
            },
            cases_interval: self.polling.cases_interval(),
            detail_interval: self.polling.detail_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "NEURO_PULSE__PUSH__URL",
        "NEURO_PULSE__PUSH__ENABLED",
        "NEURO_PULSE__PUSH__MAX_RECONNECT_ATTEMPTS",
        "NEURO_PULSE__PUSH__HEARTBEAT_SECS",
        "NEURO_PULSE__API__BASE_URL",
        "NEURO_PULSE__API__TIMEOUT_SECS",
        "NEURO_PULSE__POLLING__CASES_INTERVAL_SECS",
        "NEURO_PULSE__TELEMETRY__ENVIRONMENT",
    ];

    /// Helper to clear environment variables after testing
    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_defaults_from_empty_environment() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.push.url, "ws://localhost:8000/ws");
        assert!(config.push.enabled);
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.polling.cases_interval_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        env::set_var("NEURO_PULSE__PUSH__URL", "wss://triage.example.org/ws");
        env::set_var("NEURO_PULSE__PUSH__ENABLED", "false");
        env::set_var("NEURO_PULSE__PUSH__MAX_RECONNECT_ATTEMPTS", "3");
        env::set_var("NEURO_PULSE__PUSH__HEARTBEAT_SECS", "20");
        env::set_var("NEURO_PULSE__API__BASE_URL", "https://triage.example.org");
        env::set_var("NEURO_PULSE__API__TIMEOUT_SECS", "4");
        env::set_var("NEURO_PULSE__POLLING__CASES_INTERVAL_SECS", "60");
        env::set_var("NEURO_PULSE__TELEMETRY__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.push.url, "wss://triage.example.org/ws");
        assert!(!config.push.enabled);
        assert_eq!(config.push.max_reconnect_attempts, 3);
        assert_eq!(config.push.heartbeat_secs, Some(20));
        assert_eq!(config.api.base_url, "https://triage.example.org");
        assert_eq!(config.api.timeout_secs, 4);
        assert_eq!(config.polling.cases_interval_secs, 60);
        assert_eq!(config.polling.detail_interval_secs, 5);
        assert!(config.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_unparseable_values() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        env::set_var("NEURO_PULSE__API__TIMEOUT_SECS", "soon");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_validate_reports_first_invalid_section() {
        let mut config = AppConfig::default();
        config.api.base_url = "localhost:8000".to_string();
        assert_eq!(config.validate(), Err(ValidationError::InvalidApiUrl));
    }

    #[test]
    fn test_session_settings_mapping() {
        let mut config = AppConfig::default();
        config.push.heartbeat_secs = Some(15);
        config.push.max_reconnect_attempts = 4;
        config.polling.detail_interval_secs = 2;

        let settings = config.session_settings();
        assert_eq!(settings.connection.url, "ws://localhost:8000/ws");
        assert!(settings.connection.enabled);
        assert_eq!(settings.connection.policy.max_attempts, 4);
        assert_eq!(settings.connection.heartbeat, Some(Duration::from_secs(15)));
        assert!(settings.connection.diagnostic_mode);
        assert_eq!(settings.cases_interval, Duration::from_secs(30));
        assert_eq!(settings.detail_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_production_disables_diagnostic_mode() {
        let mut config = AppConfig::default();
        config.telemetry.environment = Environment::Production;
        assert!(!config.session_settings().connection.diagnostic_mode);
    }
}
