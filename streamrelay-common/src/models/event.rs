// File: streamrelay-common/src/models/event.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One `event` frame from the Streamlabs socket.
///
/// Only `type`, `for` and `message` are interpreted; anything else the
/// service sends along (`event_id`, ...) is kept in `extra` untouched.
/// A non-string `type` or `for` reads as absent instead of failing the
/// whole envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type", default, deserialize_with = "string_or_empty")]
    pub event_type: String,

    /// Originating sub-account, e.g. `twitch_account`.
    #[serde(
        rename = "for",
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub origin: Option<String>,

    /// Opaque payload. Absent and `null` both land here as `Value::Null`.
    #[serde(default)]
    pub message: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, message: Value) -> Self {
        Self {
            event_type: event_type.into(),
            origin: None,
            message,
            extra: Map::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_or_none(deserializer)?.unwrap_or_default())
}

/// Everything the connection manager reports, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// Namespace handshake completed.
    Connected,
    Event(EventEnvelope),
    /// An established connection dropped.
    Disconnected(String),
    /// Handshake or transport failure before the connection was established.
    ConnectError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_chat_message_envelope() {
        let raw = json!({
            "type": "chat_message",
            "for": "twitch_account",
            "message": [{ "from": "viewer", "body": "hi" }],
            "event_id": "evt-1"
        });
        let env: EventEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(env.event_type, "chat_message");
        assert_eq!(env.origin.as_deref(), Some("twitch_account"));
        assert_eq!(env.message, json!([{ "from": "viewer", "body": "hi" }]));
        assert_eq!(env.extra.get("event_id"), Some(&json!("evt-1")));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let env: EventEnvelope = serde_json::from_value(json!({ "type": "follow" })).unwrap();
        assert_eq!(env.event_type, "follow");
        assert!(env.origin.is_none());
        assert_eq!(env.message, Value::Null);

        let env: EventEnvelope = serde_json::from_value(json!({})).unwrap();
        assert_eq!(env.event_type, "");
    }

    #[test]
    fn non_string_type_or_origin_does_not_fail_decoding() {
        let env: EventEnvelope =
            serde_json::from_value(json!({ "type": "chat_message", "for": 7, "message": "x" })).unwrap();
        assert_eq!(env.event_type, "chat_message");
        assert!(env.origin.is_none());
        assert_eq!(env.message, json!("x"));

        let env: EventEnvelope =
            serde_json::from_value(json!({ "type": ["chat_message"], "for": null, "message": "y" })).unwrap();
        assert_eq!(env.event_type, "");
        assert!(env.origin.is_none());
    }
}
