//! Reconnect policy.

use std::time::Duration;

use cafeteira_core::config::RealtimeConfig;

/// Fixed-delay reconnect schedule.
///
/// `max_attempts` is reported when exceeded but does not stop retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before each attempt.
    pub delay: Duration,
    /// Declared attempt cap.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Build the policy from configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.reconnect_interval_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Whether `attempt` (1-based) is past the declared cap.
    pub fn exceeds_cap(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&RealtimeConfig::default())
    }
}
