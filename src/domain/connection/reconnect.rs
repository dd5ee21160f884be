//! Exponential backoff policy for push-channel reconnection.

use std::time::Duration;

/// Reconnection policy: capped exponential backoff with a bounded attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt.
    ///
    /// Default: 1 second
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    ///
    /// Default: 10 seconds
    pub max_delay: Duration,

    /// Automatic reconnections allowed before giving up.
    ///
    /// Default: 10
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait when `attempts` reconnections have already been scheduled.
    ///
    /// `min(base * 2^attempts, max)`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempts).unwrap_or(u64::MAX);
        let delay_ms = base_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Returns true while another automatic reconnection is allowed.
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
