//! Device log entries.
//!
//! The firmware returns either plain strings or structured objects; the
//! client renders both and never validates them further.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug output.
    Debug,
    /// Informational.
    Info,
    /// A successful operation.
    Success,
    /// Something worth a look.
    Warning,
    /// A failed operation.
    Error,
    /// A fault of the device itself.
    Critical,
}

impl LogLevel {
    /// Parse a level string (`warn` and `warning` are the same level).
    /// Unknown values default to info.
    pub fn from_str_value(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => Self::Debug,
            "success" => Self::Success,
            "warn" | "warning" => Self::Warning,
            "error" => Self::Error,
            "critical" => Self::Critical,
            _ => Self::Info,
        }
    }

    /// Infer a level from the text of an unstructured line.
    pub fn infer(text: &str) -> Self {
        if text.contains("ERROR") || text.contains("ERRO") {
            Self::Error
        } else if text.contains("WARN") {
            Self::Warning
        } else if text.contains("SUCCESS") || text.contains("SUCESSO") {
            Self::Success
        } else {
            Self::Info
        }
    }

    /// Lower-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured log object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredLog {
    /// Milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Level string as sent by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Log text.
    #[serde(default)]
    pub message: String,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// One device log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    /// A plain text line.
    Text(String),
    /// A structured record.
    Structured(StructuredLog),
}

impl LogEntry {
    /// Log text.
    pub fn message(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Structured(log) => &log.message,
        }
    }

    /// Explicit level, or the level inferred from the text.
    pub fn level(&self) -> LogLevel {
        match self {
            Self::Text(text) => LogLevel::infer(text),
            Self::Structured(log) => log
                .level
                .as_deref()
                .map(LogLevel::from_str_value)
                .unwrap_or(LogLevel::Info),
        }
    }

    /// Details rendered as text.
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Text(_) => None,
            Self::Structured(log) => log.details.as_ref().map(|d| match d {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    /// Timestamp in local time, when the entry carries one.
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        match self {
            Self::Text(_) => None,
            Self::Structured(log) => log
                .timestamp
                .and_then(|ms| Local.timestamp_millis_opt(ms).single()),
        }
    }
}

impl From<&str> for LogEntry {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_and_structured_decode() {
        let entries: Vec<LogEntry> = serde_json::from_value(json!([
            "[INFO] Sistema inicializado",
            {"timestamp": 1000, "level": "warn", "message": "Garrafa baixa", "details": "2 restantes"}
        ]))
        .unwrap();

        assert_eq!(entries[0].message(), "[INFO] Sistema inicializado");
        assert_eq!(entries[0].level(), LogLevel::Info);
        assert!(entries[0].timestamp().is_none());

        assert_eq!(entries[1].message(), "Garrafa baixa");
        assert_eq!(entries[1].level(), LogLevel::Warning);
        assert_eq!(entries[1].details().as_deref(), Some("2 restantes"));
        assert!(entries[1].timestamp().is_some());
    }

    #[test]
    fn test_level_inference_from_text() {
        assert_eq!(LogLevel::infer("ERRO ao servir"), LogLevel::Error);
        assert_eq!(LogLevel::infer("WARN: heap"), LogLevel::Warning);
        assert_eq!(LogLevel::infer("SUCESSO"), LogLevel::Success);
        assert_eq!(LogLevel::infer("Café servido"), LogLevel::Info);
    }

    #[test]
    fn test_non_string_details_render_as_json() {
        let entry: LogEntry =
            serde_json::from_value(json!({"message": "x", "details": {"uid": "AB"}})).unwrap();
        assert_eq!(entry.details().as_deref(), Some(r#"{"uid":"AB"}"#));
        assert_eq!(entry.level(), LogLevel::Info);
    }
}
