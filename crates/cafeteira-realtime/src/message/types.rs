//! Inbound and outbound realtime message type definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use cafeteira_core::types::{LogEntry, User};

use super::envelope::MessageEnvelope;

/// Messages pushed by the device.
///
/// Decoded from a [`MessageEnvelope`] by its `type`; kinds this client does
/// not know become [`InboundMessage::Unknown`] so consumers can log them.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Partial status update, shallow-merged into the cached stats.
    SystemStatus(Map<String, Value>),
    /// Complete status, sent when a client asks for it.
    FullStatus(Map<String, Value>),
    /// Changes to one user row.
    UserActivity(UserActivity),
    /// A coffee was dispensed.
    CoffeeServed(CoffeeServed),
    /// A card was presented to the reader.
    RfidEvent(RfidEvent),
    /// A new device log line.
    LogEntry(LogEntry),
    /// Free-form alert to show as-is.
    Alert(AlertPush),
    /// An unregistered card was scanned.
    NewRfidUid(NewRfidUid),
    /// Full user list.
    UserList(Vec<User>),
    /// Any other `type`.
    Unknown {
        /// The unrecognised `type` value.
        kind: String,
    },
}

/// `user_activity` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    /// Card of the affected user.
    pub uid: String,
    /// Changed fields.
    #[serde(flatten)]
    pub changes: Map<String, Value>,
}

/// `coffee_served` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoffeeServed {
    /// Who got the coffee.
    #[serde(default)]
    pub user_name: String,
    /// Card used, when the serve came from the reader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// `rfid_event` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfidEvent {
    /// Card holder name.
    #[serde(default)]
    pub user_name: String,
    /// What the reader did with the card.
    #[serde(default)]
    pub action: String,
    /// Whether the action succeeded.
    #[serde(default)]
    pub success: bool,
}

/// `alert` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPush {
    /// Text to show.
    pub message: String,
    /// Severity name (`success`, `error`, `warning`, `info`).
    #[serde(rename = "type", default)]
    pub severity: String,
}

/// `new_rfid_uid` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRfidUid {
    /// Scanned card.
    pub uid: String,
}

impl InboundMessage {
    /// Decode an envelope. Known kinds whose `data` does not fit their
    /// payload are errors.
    pub fn from_envelope(envelope: MessageEnvelope) -> Result<Self, serde_json::Error> {
        let MessageEnvelope { kind, data, .. } = envelope;
        let message = match kind.as_str() {
            "system_status" => Self::SystemStatus(serde_json::from_value(data)?),
            "full_status" => Self::FullStatus(serde_json::from_value(data)?),
            "user_activity" => Self::UserActivity(serde_json::from_value(data)?),
            "coffee_served" => Self::CoffeeServed(serde_json::from_value(data)?),
            "rfid_event" => Self::RfidEvent(serde_json::from_value(data)?),
            "log_entry" => Self::LogEntry(serde_json::from_value(data)?),
            "alert" => Self::Alert(serde_json::from_value(data)?),
            "new_rfid_uid" => Self::NewRfidUid(serde_json::from_value(data)?),
            "user_list" => Self::UserList(serde_json::from_value(data)?),
            _ => Self::Unknown { kind },
        };
        Ok(message)
    }

    /// Wire name of the message kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::SystemStatus(_) => "system_status",
            Self::FullStatus(_) => "full_status",
            Self::UserActivity(_) => "user_activity",
            Self::CoffeeServed(_) => "coffee_served",
            Self::RfidEvent(_) => "rfid_event",
            Self::LogEntry(_) => "log_entry",
            Self::Alert(_) => "alert",
            Self::NewRfidUid(_) => "new_rfid_uid",
            Self::UserList(_) => "user_list",
            Self::Unknown { kind } => kind,
        }
    }
}

/// Messages sent to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Identify the session right after the socket opens.
    Auth {
        /// Login name.
        username: String,
        /// Role string.
        role: String,
    },
    /// Ask for a `full_status` push.
    GetStatus,
    /// Ask for a `user_list` push.
    GetUsers,
}

impl OutboundMessage {
    /// Wire name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::GetStatus => "get_status",
            Self::GetUsers => "get_users",
        }
    }

    /// `data` payload; `Null` when the kind carries none.
    pub fn data(&self) -> Value {
        match self {
            Self::Auth { username, role } => json!({"username": username, "role": role}),
            Self::GetStatus | Self::GetUsers => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(kind: &str, data: Value) -> MessageEnvelope {
        MessageEnvelope {
            kind: kind.to_string(),
            timestamp: 0,
            data,
        }
    }

    #[test]
    fn test_known_kinds_decode() {
        let msg = InboundMessage::from_envelope(envelope(
            "coffee_served",
            json!({"userName": "Ana", "uid": "AB12"}),
        ))
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::CoffeeServed(CoffeeServed {
                user_name: "Ana".into(),
                uid: Some("AB12".into()),
            })
        );

        let msg = InboundMessage::from_envelope(envelope(
            "user_activity",
            json!({"uid": "AB12", "credits": 2}),
        ))
        .unwrap();
        let InboundMessage::UserActivity(activity) = msg else {
            panic!("expected user_activity");
        };
        assert_eq!(activity.uid, "AB12");
        assert_eq!(activity.changes.get("credits"), Some(&json!(2)));
        assert!(!activity.changes.contains_key("uid"));
    }

    #[test]
    fn test_log_entry_accepts_text_and_structured() {
        let text = InboundMessage::from_envelope(envelope("log_entry", json!("ERRO: leitor"))).unwrap();
        assert_eq!(text.kind(), "log_entry");

        let structured = InboundMessage::from_envelope(envelope(
            "log_entry",
            json!({"level": "warning", "message": "Garrafa baixa"}),
        ))
        .unwrap();
        let InboundMessage::LogEntry(entry) = structured else {
            panic!("expected log_entry");
        };
        assert_eq!(entry.message(), "Garrafa baixa");
    }

    #[test]
    fn test_user_list_uses_firmware_fields() {
        let msg = InboundMessage::from_envelope(envelope(
            "user_list",
            json!([{"uid": "AB12", "name": "Joana", "credits": 3}]),
        ))
        .unwrap();
        let InboundMessage::UserList(users) = msg else {
            panic!("expected user_list");
        };
        assert_eq!(users[0].name, "Joana");
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let msg = InboundMessage::from_envelope(envelope("firmware_update", json!({}))).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Unknown {
                kind: "firmware_update".into()
            }
        );
        assert_eq!(msg.kind(), "firmware_update");
    }

    #[test]
    fn test_known_kind_with_bad_payload_is_error() {
        assert!(InboundMessage::from_envelope(envelope("system_status", json!("oops"))).is_err());
        assert!(InboundMessage::from_envelope(envelope("new_rfid_uid", Value::Null)).is_err());
    }

    #[test]
    fn test_outbound_payloads() {
        let auth = OutboundMessage::Auth {
            username: "admin".into(),
            role: "Admin".into(),
        };
        assert_eq!(auth.kind(), "auth");
        assert_eq!(auth.data(), json!({"username": "admin", "role": "Admin"}));
        assert_eq!(OutboundMessage::GetUsers.data(), Value::Null);
    }
}
