//! Message envelope for framing realtime messages.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::OutboundMessage;

/// `{type, timestamp, data}` frame.
///
/// The device pushes `{type, data}`; `timestamp` is only set on frames
/// this client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timestamp: i64,
    /// Kind-specific payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl MessageEnvelope {
    /// Wrap an outbound message, stamped with the current time.
    pub fn new(message: &OutboundMessage) -> Self {
        Self::at(message, Utc::now().timestamp_millis())
    }

    /// Wrap an outbound message with an explicit timestamp.
    pub fn at(message: &OutboundMessage, timestamp: i64) -> Self {
        Self {
            kind: message.kind().to_string(),
            timestamp,
            data: message.data(),
        }
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_shape() {
        let envelope = MessageEnvelope::at(
            &OutboundMessage::Auth {
                username: "admin".into(),
                role: "Admin".into(),
            },
            1_700_000_000_000,
        );
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"type": "auth", "timestamp": 1_700_000_000_000_i64,
                   "data": {"username": "admin", "role": "Admin"}})
        );

        let bare = serde_json::to_value(MessageEnvelope::at(&OutboundMessage::GetStatus, 5)).unwrap();
        assert_eq!(bare, json!({"type": "get_status", "timestamp": 5}));
    }

    #[test]
    fn test_inbound_frame_without_timestamp() {
        let envelope: MessageEnvelope =
            serde_json::from_str(r#"{"type":"alert","data":{"message":"Oi","type":"info"}}"#).unwrap();
        assert_eq!(envelope.kind, "alert");
        assert_eq!(envelope.timestamp, 0);
    }
}
