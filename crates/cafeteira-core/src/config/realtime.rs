//! Realtime WebSocket client configuration.

use serde::{Deserialize, Serialize};

/// Realtime (WebSocket) client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Whether the monitor opens the realtime socket at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Socket path on the device.
    #[serde(default = "default_path")]
    pub path: String,
    /// Fixed delay before a reconnect attempt, in milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
    /// Declared reconnect cap. Reported in logs, never enforced.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Buffer size of the inbound message broadcast channel.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_path(),
            reconnect_interval_ms: default_reconnect_interval(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            channel_buffer_size: default_channel_buffer(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_reconnect_interval() -> u64 {
    5000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_channel_buffer() -> usize {
    256
}
