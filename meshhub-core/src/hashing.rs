//! Content hashing for cross-gateway deduplication.
//!
//! Each event kind folds a fixed set of identifying fields into a canonical
//! JSON object (keys sorted at every depth, absent values written as `null`)
//! and digests it with SHA-256. Kinds whose payload carries no sender-side
//! timestamp (advertisements, telemetry) replace the receive time with the
//! start of its time bucket, so gateways that hear the same broadcast a few
//! seconds apart still agree on the hash.
//!
//! Changing the field lists or the bucket size changes the hash of events
//! that were already ingested; old and new rows will no longer deduplicate
//! against each other.

use serde_json::{Map, Value, json};

/// Default advertisement / telemetry bucket width.
pub const DEFAULT_BUCKET_SECONDS: i64 = 300;

/// Round `timestamp` down to the start of its bucket.
///
/// Non-positive widths are treated as one second.
pub fn bucket_timestamp(timestamp: i64, bucket_seconds: i64) -> i64 {
    let width = bucket_seconds.max(1);
    timestamp.div_euclid(width) * width
}

/// Who sent a message: a contact (by public-key prefix) or a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSender<'a> {
    Contact(Option<&'a str>),
    Channel(Option<i32>),
}

impl MessageSender<'_> {
    fn message_type(&self) -> &'static str {
        match self {
            MessageSender::Contact(_) => "contact",
            MessageSender::Channel(_) => "channel",
        }
    }

    fn identity(&self) -> Value {
        match self {
            MessageSender::Contact(prefix) => json!(prefix),
            MessageSender::Channel(idx) => json!(idx),
        }
    }
}

/// Identifying fields of an advertisement.
#[derive(Debug, Clone, Copy)]
pub struct AdvertisementIdentity<'a> {
    pub public_key: &'a str,
    pub name: Option<&'a str>,
    pub adv_type: Option<&'a str>,
    pub flags: Option<i64>,
}

/// Computes event hashes with a configured bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEngine {
    bucket_seconds: i64,
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SECONDS)
    }
}

impl HashEngine {
    pub fn new(bucket_seconds: i64) -> Self {
        Self {
            bucket_seconds: bucket_seconds.max(1),
        }
    }

    pub fn bucket_seconds(&self) -> i64 {
        self.bucket_seconds
    }

    /// Messages carry their own sender timestamp; no bucketing.
    pub fn message(
        &self,
        text: &str,
        sender: MessageSender<'_>,
        txt_type: Option<i32>,
        sender_timestamp: Option<i64>,
    ) -> String {
        digest(&json!({
            "kind": "message",
            "message_type": sender.message_type(),
            "sender": sender.identity(),
            "sender_timestamp": sender_timestamp,
            "text": text,
            "txt_type": txt_type,
        }))
    }

    pub fn advertisement(&self, advert: AdvertisementIdentity<'_>, received_at: i64) -> String {
        digest(&json!({
            "kind": "advertisement",
            "public_key": advert.public_key,
            "name": advert.name,
            "adv_type": advert.adv_type,
            "flags": advert.flags,
            "bucket": bucket_timestamp(received_at, self.bucket_seconds),
        }))
    }

    pub fn telemetry(
        &self,
        node_public_key: &str,
        parsed_data: Option<&Map<String, Value>>,
        received_at: i64,
    ) -> String {
        digest(&json!({
            "kind": "telemetry",
            "node_public_key": node_public_key,
            "parsed_data": parsed_data,
            "bucket": bucket_timestamp(received_at, self.bucket_seconds),
        }))
    }

    /// The initiator tag is unique per trace operation on its own.
    pub fn trace(&self, initiator_tag: i64) -> String {
        digest(&json!({
            "kind": "trace",
            "initiator_tag": initiator_tag,
        }))
    }
}

/// SHA-256 of the canonical serialization, as 64 lowercase hex chars.
pub fn digest(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    let hash = ring::digest::digest(&ring::digest::SHA256, canonical.as_bytes());
    hex::encode(hash.as_ref())
}

/// Serialize `value` with object keys sorted at every depth.
///
/// Does not rely on `serde_json`'s map ordering, which changes when any crate
/// in the build enables `preserve_order`.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "aa00000000000000000000000000000000000000000000000000000000000001";

    fn advert() -> AdvertisementIdentity<'static> {
        AdvertisementIdentity {
            public_key: KEY,
            name: Some("Hilltop"),
            adv_type: Some("repeater"),
            flags: Some(1),
        }
    }

    // 10:31:00, 10:33:00 and 10:36:00 on an arbitrary day.
    const T_1031: i64 = 1_700_000_000 - 1_700_000_000 % 86_400 + 10 * 3600 + 31 * 60;
    const T_1033: i64 = T_1031 + 120;
    const T_1036: i64 = T_1031 + 300;

    #[test]
    fn test_bucket_timestamp() {
        assert_eq!(bucket_timestamp(1000, 300), 900);
        assert_eq!(bucket_timestamp(900, 300), 900);
        assert_eq!(bucket_timestamp(-1, 300), -300);
        assert_eq!(bucket_timestamp(17, 0), 17);
    }

    #[test]
    fn test_advertisement_time_bucket_stability() {
        let engine = HashEngine::new(300);
        let a = engine.advertisement(advert(), T_1031);
        let b = engine.advertisement(advert(), T_1033);
        let c = engine.advertisement(advert(), T_1036);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_telemetry_hash_is_key_order_independent() {
        let engine = HashEngine::default();
        let first: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let second: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(
            engine.telemetry(KEY, first.as_object(), T_1031),
            engine.telemetry(KEY, second.as_object(), T_1033),
        );
    }

    #[test]
    fn test_nested_objects_are_canonicalized() {
        let first: Value = serde_json::from_str(r#"{"x":{"b":[1,{"d":1,"c":2}],"a":null}}"#).unwrap();
        let second: Value = serde_json::from_str(r#"{"x":{"a":null,"b":[1,{"c":2,"d":1}]}}"#).unwrap();
        assert_eq!(digest(&first), digest(&second));
    }

    #[test]
    fn test_missing_field_is_not_confused_with_present() {
        let engine = HashEngine::default();
        let without_name = AdvertisementIdentity {
            name: None,
            ..advert()
        };
        assert_ne!(
            engine.advertisement(advert(), T_1031),
            engine.advertisement(without_name, T_1031)
        );

        let with_empty = AdvertisementIdentity {
            name: Some(""),
            ..advert()
        };
        assert_ne!(
            engine.advertisement(without_name, T_1031),
            engine.advertisement(with_empty, T_1031)
        );
    }

    #[test]
    fn test_message_hash_requires_exact_match() {
        let engine = HashEngine::default();
        let base = engine.message("hello", MessageSender::Channel(Some(0)), Some(0), Some(1_700_000_000));
        assert_eq!(
            base,
            engine.message("hello", MessageSender::Channel(Some(0)), Some(0), Some(1_700_000_000))
        );
        assert_ne!(
            base,
            engine.message("hello", MessageSender::Channel(Some(0)), Some(0), Some(1_700_000_001))
        );
        assert_ne!(
            base,
            engine.message("hello", MessageSender::Channel(Some(1)), Some(0), Some(1_700_000_000))
        );
        assert_ne!(
            engine.message("hi", MessageSender::Contact(Some("0")), None, None),
            engine.message("hi", MessageSender::Channel(Some(0)), None, None)
        );
    }

    #[test]
    fn test_message_hash_includes_text_type() {
        let engine = HashEngine::default();
        let sender = MessageSender::Contact(Some("abcdef"));
        let plain = engine.message("hi", sender, Some(0), Some(1_700_000_000));
        let signed = engine.message("hi", sender, Some(2), Some(1_700_000_000));
        let unknown = engine.message("hi", sender, None, Some(1_700_000_000));
        assert_ne!(plain, signed);
        assert_ne!(plain, unknown);
    }

    #[test]
    fn test_digest_is_lowercase_hex() {
        let hash = digest(&json!({"kind": "trace", "initiator_tag": 1}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn test_trace_hash_depends_only_on_tag() {
        let engine = HashEngine::new(60);
        assert_eq!(engine.trace(42), HashEngine::new(600).trace(42));
        assert_ne!(engine.trace(42), engine.trace(43));
    }
}
