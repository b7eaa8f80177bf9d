//! Device (REST backend) configuration.

use serde::{Deserialize, Serialize};

/// Which generation of the device firmware API to talk to.
///
/// The first firmware exposed Portuguese routes and field names
/// (`/api/usuarios`, `nome`, `creditos`); later builds moved to English
/// routes (`/api/users`, `name`, `credits`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiDialect {
    /// English routes and fields.
    #[default]
    Current,
    /// Portuguese routes and fields.
    Legacy,
}

/// Connection settings for the coffee device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Base URL of the device web server (scheme + host[:port]).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API dialect spoken by the firmware.
    #[serde(default)]
    pub dialect: ApiDialect,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Existing session id, sent as the `session_id` cookie.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Username used by the monitor to log in when no session id is set.
    #[serde(default)]
    pub username: Option<String>,
    /// Password used by the monitor to log in when no session id is set.
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dialect: ApiDialect::default(),
            request_timeout_ms: default_request_timeout(),
            session_id: None,
            username: None,
            password: None,
        }
    }
}

fn default_base_url() -> String {
    "http://cafeteira.local".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}
