// File: streamrelay-core/src/filter.rs

use serde_json::Value;
use streamrelay_common::models::EventEnvelope;

/// The only event class that gets forwarded.
pub const CHAT_MESSAGE_TYPE: &str = "chat_message";

/// Origin required in strict mode.
pub const TWITCH_ORIGIN: &str = "twitch_account";

/// Stateless predicate over inbound envelopes.
///
/// Two predicates have been used for the same relay historically: `type`
/// only, and `type` plus `for == "twitch_account"`. The second one is opt-in
/// through `strict_origin_filter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    strict_origin_filter: bool,
}

impl EventFilter {
    pub fn new(strict_origin_filter: bool) -> Self {
        Self { strict_origin_filter }
    }

    pub fn is_relevant(&self, envelope: &EventEnvelope) -> bool {
        if envelope.event_type != CHAT_MESSAGE_TYPE {
            return false;
        }
        if self.strict_origin_filter {
            return envelope.origin.as_deref() == Some(TWITCH_ORIGIN);
        }
        true
    }

    /// Returns `message` untouched; an absent message is `Value::Null`.
    pub fn extract_payload(&self, envelope: EventEnvelope) -> Value {
        envelope.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_chat_types_are_rejected() {
        let filter = EventFilter::default();
        for kind in ["follow", "donation", "subscription", "host", "Chat_Message", ""] {
            let env = EventEnvelope::new(kind, json!("hello"));
            assert!(!filter.is_relevant(&env), "{kind} should not match");
        }
    }

    #[test]
    fn chat_message_payload_passes_through_unchanged() {
        let filter = EventFilter::default();
        let payloads = [
            json!("hello"),
            json!([{ "from": "viewer", "body": "hi there", "platform": "twitch" }]),
            json!({ "nested": { "n": 1 } }),
            Value::Null,
        ];
        for payload in payloads {
            let env = EventEnvelope::new(CHAT_MESSAGE_TYPE, payload.clone());
            assert!(filter.is_relevant(&env));
            assert_eq!(filter.extract_payload(env), payload);
        }
    }

    #[test]
    fn default_mode_ignores_origin() {
        let filter = EventFilter::new(false);
        let env = EventEnvelope::new(CHAT_MESSAGE_TYPE, json!("hi")).with_origin("youtube_account");
        assert!(filter.is_relevant(&env));
    }

    #[test]
    fn strict_mode_requires_twitch_origin() {
        let filter = EventFilter::new(true);

        let twitch = EventEnvelope::new(CHAT_MESSAGE_TYPE, json!("hi")).with_origin(TWITCH_ORIGIN);
        assert!(filter.is_relevant(&twitch));

        let youtube = EventEnvelope::new(CHAT_MESSAGE_TYPE, json!("hi")).with_origin("youtube_account");
        assert!(!filter.is_relevant(&youtube));

        let no_origin = EventEnvelope::new(CHAT_MESSAGE_TYPE, json!("hi"));
        assert!(!filter.is_relevant(&no_origin));
    }
}
