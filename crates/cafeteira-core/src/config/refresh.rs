//! Polling intervals and snapshot cache limits.

use serde::{Deserialize, Serialize};

/// View refresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Whether periodic polling starts enabled.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
    /// Polling interval of the single-page status view, in seconds.
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
    /// Polling interval of the admin dashboard, in seconds.
    #[serde(default = "default_dashboard_interval")]
    pub dashboard_interval_secs: u64,
    /// Polling interval of the logs page, in seconds.
    #[serde(default = "default_logs_interval")]
    pub logs_interval_secs: u64,
    /// Number of log lines fetched for the dashboard's recent activity panel.
    #[serde(default = "default_recent_logs_limit")]
    pub recent_logs_limit: u32,
    /// Number of log lines fetched for the logs page.
    #[serde(default = "default_logs_page_limit")]
    pub logs_page_limit: u32,
    /// Maximum number of log entries kept in memory.
    #[serde(default = "default_log_buffer_capacity")]
    pub log_buffer_capacity: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            status_interval_secs: default_status_interval(),
            dashboard_interval_secs: default_dashboard_interval(),
            logs_interval_secs: default_logs_interval(),
            recent_logs_limit: default_recent_logs_limit(),
            logs_page_limit: default_logs_page_limit(),
            log_buffer_capacity: default_log_buffer_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_status_interval() -> u64 {
    5
}

fn default_dashboard_interval() -> u64 {
    30
}

fn default_logs_interval() -> u64 {
    10
}

fn default_recent_logs_limit() -> u32 {
    5
}

fn default_logs_page_limit() -> u32 {
    50
}

fn default_log_buffer_capacity() -> usize {
    100
}
