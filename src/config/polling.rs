//! Polling configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Poll intervals for the pull side
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Full case list refresh interval in seconds
    #[serde(default = "default_cases_interval")]
    pub cases_interval_secs: u64,

    /// Selected case detail refresh interval in seconds
    #[serde(default = "default_detail_interval")]
    pub detail_interval_secs: u64,
}

impl PollingConfig {
    pub fn cases_interval(&self) -> Duration {
        Duration::from_secs(self.cases_interval_secs)
    }

    pub fn detail_interval(&self) -> Duration {
        Duration::from_secs(self.detail_interval_secs)
    }

    /// Validate polling configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cases_interval_secs == 0 {
            return Err(ValidationError::InvalidInterval("cases_interval_secs"));
        }
        if self.detail_interval_secs == 0 {
            return Err(ValidationError::InvalidInterval("detail_interval_secs"));
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            cases_interval_secs: default_cases_interval(),
            detail_interval_secs: default_detail_interval(),
        }
    }
}

fn default_cases_interval() -> u64 {
    30
}

fn default_detail_interval() -> u64 {
    5
}
