//! JSON serialization for realtime messages.

use cafeteira_core::error::{AppError, ErrorKind};
use cafeteira_core::AppResult;

use super::envelope::MessageEnvelope;
use super::types::{InboundMessage, OutboundMessage};

/// Serialize an outbound message inside a timestamped envelope.
pub fn serialize_outbound(message: &OutboundMessage) -> AppResult<String> {
    Ok(serde_json::to_string(&MessageEnvelope::new(message))?)
}

/// Deserialize a text frame pushed by the device.
pub fn deserialize_inbound(text: &str) -> AppResult<InboundMessage> {
    serde_json::from_str::<MessageEnvelope>(text)
        .and_then(InboundMessage::from_envelope)
        .map_err(|e| AppError::with_source(ErrorKind::Protocol, format!("Malformed realtime frame: {e}"), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_frames_are_protocol_errors() {
        for text in ["not json", "{}", r#"{"type":"rfid_event","data":[1,2]}"#] {
            let err = deserialize_inbound(text).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Protocol, "{text}");
        }
    }

    #[test]
    fn test_serialize_outbound_has_timestamp() {
        let text = serialize_outbound(&OutboundMessage::GetUsers).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "get_users");
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }
}
