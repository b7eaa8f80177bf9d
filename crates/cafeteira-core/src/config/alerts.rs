//! Alert sink configuration.

use serde::{Deserialize, Serialize};

/// Alert display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Delay before an alert hides itself, in milliseconds.
    #[serde(default = "default_auto_hide_delay")]
    pub auto_hide_delay_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            auto_hide_delay_ms: default_auto_hide_delay(),
        }
    }
}

fn default_auto_hide_delay() -> u64 {
    5000
}
