//! MQTT topic scheme.
//!
//! Gateways publish on
//!
//! ```text
//! <prefix>/<node_public_key>/event/<event_name>
//! ```
//!
//! and the ingestion side subscribes to `<prefix>/+/event/#`. The prefix may
//! itself contain `/` separators.

/// Length of a node public key in hex characters.
pub const PUBLIC_KEY_HEX_LEN: usize = 64;

/// Errors produced when a topic does not follow the event scheme.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic does not start with prefix {0:?}")]
    PrefixMismatch(String),
    #[error("topic has no `event` segment after the public key")]
    NotAnEvent,
    #[error("invalid node public key {0:?}")]
    InvalidPublicKey(String),
    #[error("empty event name")]
    EmptyEventName,
}

/// A parsed event topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTopic {
    /// Lowercased public key of the gateway that published the event.
    pub public_key: String,
    /// Event name, e.g. `advertisement` or `channel_msg_recv`.
    pub event_name: String,
}

impl EventTopic {
    /// Parse `topic` against `prefix`.
    pub fn parse(prefix: &str, topic: &str) -> Result<Self, TopicError> {
        let prefix = prefix.trim_end_matches('/');
        let rest = topic
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| TopicError::PrefixMismatch(prefix.to_string()))?;

        let mut parts = rest.splitn(3, '/');
        let key = parts.next().unwrap_or_default();
        if parts.next() != Some("event") {
            return Err(TopicError::NotAnEvent);
        }
        let event_name = parts.next().unwrap_or_default();
        if event_name.is_empty() {
            return Err(TopicError::EmptyEventName);
        }
        if !is_valid_public_key(key) {
            return Err(TopicError::InvalidPublicKey(key.to_string()));
        }

        Ok(Self {
            public_key: key.to_ascii_lowercase(),
            event_name: event_name.to_string(),
        })
    }

    /// Format the topic a gateway would publish this event on.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{}/{}/event/{}",
            prefix.trim_end_matches('/'),
            self.public_key,
            self.event_name
        )
    }
}

/// The wildcard subscription covering every event topic under `prefix`.
pub fn subscription_pattern(prefix: &str) -> String {
    format!("{}/+/event/#", prefix.trim_end_matches('/'))
}

/// Whether `key` is a 64-character hex public key (either case).
pub fn is_valid_public_key(key: &str) -> bool {
    key.len() == PUBLIC_KEY_HEX_LEN && key.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ABCDEF0123456789abcdef0123456789abcdef0123456789abcdef0123456789";

    #[test]
    fn test_parse_event_topic() {
        let topic = format!("meshcore/{KEY}/event/advertisement");
        let parsed = EventTopic::parse("meshcore", &topic).unwrap();
        assert_eq!(parsed.public_key, KEY.to_ascii_lowercase());
        assert_eq!(parsed.event_name, "advertisement");
    }

    #[test]
    fn test_parse_multi_segment_prefix() {
        let topic = format!("site/a/meshcore/{KEY}/event/trace_data");
        let parsed = EventTopic::parse("site/a/meshcore/", &topic).unwrap();
        assert_eq!(parsed.event_name, "trace_data");
    }

    #[test]
    fn test_parse_rejects_bad_topics() {
        assert_eq!(
            EventTopic::parse("meshcore", &format!("other/{KEY}/event/x")),
            Err(TopicError::PrefixMismatch("meshcore".to_string()))
        );
        assert_eq!(
            EventTopic::parse("meshcore", &format!("meshcore/{KEY}/command/x")),
            Err(TopicError::NotAnEvent)
        );
        assert_eq!(
            EventTopic::parse("meshcore", &format!("meshcore/{KEY}/event/")),
            Err(TopicError::EmptyEventName)
        );
        assert!(matches!(
            EventTopic::parse("meshcore", "meshcore/nothex/event/advertisement"),
            Err(TopicError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            EventTopic::parse("meshcore", "meshcorex/abc/event/advertisement"),
            Err(TopicError::PrefixMismatch(_))
        ));
    }

    #[test]
    fn test_format_roundtrips_through_subscription() {
        let topic = EventTopic {
            public_key: KEY.to_ascii_lowercase(),
            event_name: "channel_msg_recv".to_string(),
        };
        assert_eq!(
            topic.format("meshcore"),
            format!("meshcore/{}/event/channel_msg_recv", KEY.to_ascii_lowercase())
        );
        assert_eq!(subscription_pattern("meshcore/"), "meshcore/+/event/#");
    }
}
