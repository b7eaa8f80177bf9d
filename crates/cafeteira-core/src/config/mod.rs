//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every section has defaults, so an empty file is a valid
//! configuration for a device reachable at the default address.

pub mod alerts;
pub mod device;
pub mod logging;
pub mod realtime;
pub mod refresh;

use serde::{Deserialize, Serialize};

pub use self::alerts::AlertConfig;
pub use self::device::{ApiDialect, DeviceConfig};
pub use self::logging::LoggingConfig;
pub use self::realtime::RealtimeConfig;
pub use self::refresh::RefreshConfig;

use crate::error::AppError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CAFETEIRA";

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (base file + environment overlay + env vars).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Device (REST backend) settings.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Realtime WebSocket client settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Alert sink settings.
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Polling intervals and cache limits.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the base configuration at `config_path` with an
    /// environment-specific overlay (`config/{env}.toml`) and environment
    /// variables prefixed with `CAFETEIRA__` (sections separated by `__`).
    /// Missing files are not an error.
    pub fn load(config_path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.device.base_url, "http://cafeteira.local");
        assert_eq!(config.device.dialect, ApiDialect::Current);
        assert_eq!(config.realtime.reconnect_interval_ms, 5000);
        assert_eq!(config.realtime.max_reconnect_attempts, 10);
        assert_eq!(config.alerts.auto_hide_delay_ms, 5000);
        assert_eq!(config.refresh.log_buffer_capacity, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [device]
            base_url = "http://192.168.4.1"
            dialect = "legacy"

            [refresh]
            dashboard_interval_secs = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.device.base_url, "http://192.168.4.1");
        assert_eq!(config.device.dialect, ApiDialect::Legacy);
        assert_eq!(config.refresh.dashboard_interval_secs, 12);
        assert_eq!(config.refresh.logs_interval_secs, 10);
    }

    #[test]
    fn test_unknown_dialect_is_rejected() {
        let result = AppConfig::from_toml("[device]\ndialect = \"klingon\"\n");
        assert!(result.is_err());
    }
}
