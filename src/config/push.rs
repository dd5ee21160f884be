//! Push channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::connection::ReconnectPolicy;

/// Push channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// WebSocket endpoint
    #[serde(default = "default_url")]
    pub url: String,

    /// When false the client relies on polling alone
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Automatic reconnections before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Reconnect delay cap in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Client keepalive interval in seconds; unset disables the keepalive
    #[serde(default)]
    pub heartbeat_secs: Option<u64>,
}

impl PushConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn heartbeat(&self) -> Option<Duration> {
        self.heartbeat_secs.map(Duration::from_secs)
    }

    /// Validate push configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("PUSH_URL"));
        }
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(ValidationError::InvalidPushUrl);
        }
        if self.base_delay_ms == 0 || self.base_delay_ms > self.max_delay_ms {
            return Err(ValidationError::InvalidReconnectDelays);
        }
        if self.heartbeat_secs == Some(0) {
            return Err(ValidationError::InvalidHeartbeat);
        }
        Ok(())
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            enabled: default_enabled(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            heartbeat_secs: None,
        }
    }
}

fn default_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_config_defaults() {
        let config = PushConfig::default();
        assert_eq!(config.url, "ws://localhost:8000/ws");
        assert!(config.enabled);
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.heartbeat(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_http_url() {
        let config = PushConfig {
            url: "http://localhost:8000/ws".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPushUrl));
    }

    #[test]
    fn test_validation_accepts_wss() {
        let config = PushConfig {
            url: "wss://triage.example.org/ws".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_inverted_delays() {
        let config = PushConfig {
            base_delay_ms: 20_000,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidReconnectDelays));

        let config = PushConfig {
            base_delay_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_heartbeat() {
        let config = PushConfig {
            heartbeat_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidHeartbeat));
    }
}
