//! Per-kind persistence handlers.
//!
//! Every known event name maps to an [`EventKind`] variant bound to a typed
//! [`EventHandler`]. Names nobody registered map to [`EventKind::Unknown`],
//! whose handler stores the raw payload in `events_log` so nothing is lost.
//!
//! A handler only *plans* the write: it validates the payload, computes the
//! content hash and returns an [`IngestRecord`]. The registry then hands that
//! record to the [`IngestStore`], which applies it in one transaction. A
//! handler returning `None` means a required field was missing and nothing
//! is written.

mod advertisement;
mod event_log;
mod message;
mod telemetry;
mod trace;

pub use advertisement::AdvertisementHandler;
pub use event_log::EventLogHandler;
pub use message::{ChannelMessageHandler, ContactMessageHandler};
pub use telemetry::TelemetryHandler;
pub use trace::TraceHandler;

use crate::entities::node::NodeSighting;
use crate::hashing::HashEngine;
use crate::store::{IngestRecord, IngestStore, PersistOutcome, StoreError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid {event_type} payload: {source}")]
    Payload {
        event_type: String,
        source: serde_json::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The closed set of event kinds with a dedicated handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Advertisement,
    ContactMessage,
    ChannelMessage,
    TraceData,
    TelemetryResponse,
    /// Any other event name; stored verbatim in the event log.
    Unknown(String),
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "advertisement" => EventKind::Advertisement,
            "contact_msg_recv" => EventKind::ContactMessage,
            "channel_msg_recv" => EventKind::ChannelMessage,
            "trace_data" => EventKind::TraceData,
            "telemetry_response" => EventKind::TelemetryResponse,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EventKind::Advertisement => "advertisement",
            EventKind::ContactMessage => "contact_msg_recv",
            EventKind::ChannelMessage => "channel_msg_recv",
            EventKind::TraceData => "trace_data",
            EventKind::TelemetryResponse => "telemetry_response",
            EventKind::Unknown(name) => name,
        }
    }

    pub fn handler(&self) -> &'static dyn EventHandler {
        match self {
            EventKind::Advertisement => &AdvertisementHandler,
            EventKind::ContactMessage => &ContactMessageHandler,
            EventKind::ChannelMessage => &ChannelMessageHandler,
            EventKind::TraceData => &TraceHandler,
            EventKind::TelemetryResponse => &TelemetryHandler,
            EventKind::Unknown(_) => &EventLogHandler,
        }
    }
}

/// Inputs shared by every handler invocation.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub receiver_public_key: &'a str,
    pub event_name: &'a str,
    pub received_at: OffsetDateTime,
    pub hash: &'a HashEngine,
}

impl EventContext<'_> {
    /// The gateway, seen just now.
    pub fn receiver_sighting(&self) -> NodeSighting {
        NodeSighting::bare(self.receiver_public_key, self.received_at)
    }

    /// Deserialize the payload into the kind's typed shape.
    pub fn decode<T: DeserializeOwned>(&self, payload: &Value) -> Result<T, HandlerError> {
        T::deserialize(payload).map_err(|source| HandlerError::Payload {
            event_type: self.event_name.to_string(),
            source,
        })
    }

    /// Log a dropped event. Always returns `None` for use as a tail call.
    pub fn missing(&self, field: &'static str) -> Option<IngestRecord> {
        warn!(
            event_type = %self.event_name,
            receiver = %self.receiver_public_key,
            field,
            "Required field missing, event not stored"
        );
        None
    }
}

/// Turns one payload into a write plan.
pub trait EventHandler: Send + Sync {
    fn prepare(
        &self,
        ctx: &EventContext<'_>,
        payload: &Value,
    ) -> Result<Option<IngestRecord>, HandlerError>;
}

/// What the registry did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Required fields were missing; nothing was written.
    Skipped,
    Persisted(PersistOutcome),
}

/// Dispatches events to their handler and persists the result.
#[derive(Clone)]
pub struct HandlerRegistry {
    store: Arc<dyn IngestStore>,
    hash: HashEngine,
}

impl HandlerRegistry {
    pub fn new(store: Arc<dyn IngestStore>, hash: HashEngine) -> Self {
        Self { store, hash }
    }

    pub async fn handle(
        &self,
        kind: &EventKind,
        receiver_public_key: &str,
        payload: &Value,
        received_at: OffsetDateTime,
    ) -> Result<HandleOutcome, HandlerError> {
        let ctx = EventContext {
            receiver_public_key,
            event_name: kind.name(),
            received_at,
            hash: &self.hash,
        };

        let Some(record) = kind.handler().prepare(&ctx, payload)? else {
            return Ok(HandleOutcome::Skipped);
        };

        let outcome = self.store.persist(record).await?;
        Ok(HandleOutcome::Persisted(outcome))
    }
}

/// Lowercase `key` if it is a valid node public key.
pub(crate) fn normalize_public_key(key: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|k| meshhub_sdk::topic::is_valid_public_key(k))
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EventTable;
    use crate::test_utils::{MemoryStore, gateway_key, node_key};
    use serde_json::json;

    fn registry(store: &Arc<MemoryStore>) -> HandlerRegistry {
        HandlerRegistry::new(store.clone(), HashEngine::default())
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for name in [
            "advertisement",
            "contact_msg_recv",
            "channel_msg_recv",
            "trace_data",
            "telemetry_response",
            "battery",
        ] {
            assert_eq!(EventKind::from_name(name).name(), name);
        }
        assert_eq!(
            EventKind::from_name("battery"),
            EventKind::Unknown("battery".to_string())
        );
    }

    #[tokio::test]
    async fn test_same_event_from_two_gateways_is_stored_once() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let now = OffsetDateTime::now_utc();
        let payload = json!({"channel_idx": 0, "text": "hello", "sender_timestamp": 1_700_000_000, "SNR": 9.0});

        let first = registry
            .handle(&EventKind::ChannelMessage, &gateway_key(1), &payload, now)
            .await
            .unwrap();
        let second = registry
            .handle(&EventKind::ChannelMessage, &gateway_key(2), &payload, now)
            .await
            .unwrap();

        let HandleOutcome::Persisted(first) = first else {
            panic!("first sighting was skipped");
        };
        let HandleOutcome::Persisted(second) = second else {
            panic!("second sighting was skipped");
        };
        assert!(first.event_inserted);
        assert!(!second.event_inserted);
        assert!(second.receiver_recorded);

        assert_eq!(store.event_count(EventTable::Messages), 1);
        assert_eq!(store.receiver_count(), 2);
        assert_eq!(store.node_count(), 2);
    }

    #[tokio::test]
    async fn test_same_gateway_twice_records_one_receiver() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let now = OffsetDateTime::now_utc();
        let payload = json!({"initiator_tag": 77, "path_len": 2});

        let mut recorded = Vec::new();
        for _ in 0..2 {
            let outcome = registry
                .handle(&EventKind::TraceData, &gateway_key(1), &payload, now)
                .await
                .unwrap();
            let HandleOutcome::Persisted(outcome) = outcome else {
                panic!("trace was skipped");
            };
            recorded.push(outcome.receiver_recorded);
        }

        assert_eq!(recorded, vec![true, false]);
        assert_eq!(store.event_count(EventTable::TracePaths), 1);
        assert_eq!(store.receiver_count(), 1);
    }

    #[tokio::test]
    async fn test_text_type_separates_messages() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let now = OffsetDateTime::now_utc();

        for txt_type in [0, 2] {
            let payload = json!({
                "pubkey_prefix": "abcdef",
                "text": "hi",
                "txt_type": txt_type,
                "sender_timestamp": 1_700_000_000,
            });
            let outcome = registry
                .handle(&EventKind::ContactMessage, &gateway_key(1), &payload, now)
                .await
                .unwrap();
            assert!(matches!(outcome, HandleOutcome::Persisted(p) if p.event_inserted));
        }
        assert_eq!(store.event_count(EventTable::Messages), 2);
    }

    #[tokio::test]
    async fn test_message_with_both_snr_spellings_is_stored() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let payload = json!({"channel_idx": 0, "text": "hi", "snr": 5.0, "SNR": 5.0});

        let outcome = registry
            .handle(&EventKind::ChannelMessage, &gateway_key(1), &payload, OffsetDateTime::now_utc())
            .await
            .unwrap();

        assert!(matches!(outcome, HandleOutcome::Persisted(p) if p.receiver_recorded));
        assert_eq!(store.event_count(EventTable::Messages), 1);
    }

    #[tokio::test]
    async fn test_missing_identity_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let now = OffsetDateTime::now_utc();

        let cases = [
            (EventKind::Advertisement, json!({"name": "No Key"})),
            (EventKind::ContactMessage, json!({"pubkey_prefix": "abcdef"})),
            (EventKind::ChannelMessage, json!({"channel_idx": 1, "text": ""})),
            (EventKind::TraceData, json!({"path_len": 3})),
            (EventKind::TelemetryResponse, json!({"parsed_data": {"a": 1}})),
        ];
        for (kind, payload) in cases {
            let outcome = registry
                .handle(&kind, &gateway_key(1), &payload, now)
                .await
                .unwrap();
            assert_eq!(outcome, HandleOutcome::Skipped, "{kind:?}");
        }

        assert_eq!(store.node_count(), 0);
        assert_eq!(store.receiver_count(), 0);
        for table in EventTable::ALL {
            assert_eq!(store.event_count(table), 0);
        }
    }

    #[tokio::test]
    async fn test_wrongly_typed_payload_is_an_error() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let result = registry
            .handle(
                &EventKind::Advertisement,
                &gateway_key(1),
                &json!({"public_key": 5}),
                OffsetDateTime::now_utc(),
            )
            .await;
        assert!(matches!(result, Err(HandlerError::Payload { .. })));
        assert_eq!(store.node_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_kind_goes_to_event_log() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let kind = EventKind::from_name("unregistered_kind");

        let outcome = registry
            .handle(&kind, &gateway_key(1), &json!({"anything": [1, 2]}), OffsetDateTime::now_utc())
            .await
            .unwrap();

        assert!(matches!(outcome, HandleOutcome::Persisted(p) if p.event_inserted && !p.receiver_recorded));
        assert_eq!(store.event_count(EventTable::EventsLog), 1);
        assert_eq!(store.logged_event_types(), vec!["unregistered_kind".to_string()]);
    }

    #[tokio::test]
    async fn test_advertisement_fills_node_details() {
        let store = Arc::new(MemoryStore::default());
        let registry = registry(&store);
        let now = OffsetDateTime::now_utc();
        let advertised = node_key(9);

        registry
            .handle(
                &EventKind::TelemetryResponse,
                &gateway_key(1),
                &json!({"node_public_key": advertised, "parsed_data": {"temp": 20}}),
                now,
            )
            .await
            .unwrap();
        assert_eq!(store.node(&advertised).unwrap().name, None);

        registry
            .handle(
                &EventKind::Advertisement,
                &gateway_key(1),
                &json!({"public_key": advertised.to_uppercase(), "name": "Hilltop", "adv_type": "repeater"}),
                now + time::Duration::seconds(5),
            )
            .await
            .unwrap();

        let node = store.node(&advertised).unwrap();
        assert_eq!(node.name.as_deref(), Some("Hilltop"));
        assert_eq!(node.adv_type.as_deref(), Some("repeater"));
        assert_eq!(node.first_seen, now);
        assert_eq!(node.last_seen, now + time::Duration::seconds(5));
    }
}
