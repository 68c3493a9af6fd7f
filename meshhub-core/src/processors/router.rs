//! EventRouter.
//!
//! The EventRouter is responsible for:
//! - Parsing `<prefix>/<public_key>/event/<name>` topics
//! - Resolving the event kind and running its handler
//! - Containing handler failures so the next event is still processed
//! - Queueing every routed event for webhook delivery without waiting

use crate::events::{WebhookEvent, WebhookEventSender};
use crate::handlers::{EventKind, HandleOutcome, HandlerRegistry};
use meshhub_sdk::topic::{EventTopic, subscription_pattern};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The topic was not an event topic; nothing was done.
    Dropped,
    /// A new event row was written.
    Persisted,
    /// Another gateway already stored this event; only the receiver was
    /// recorded.
    Duplicate,
    /// The payload lacked a required field.
    Skipped,
    /// The handler failed; the error was logged.
    Failed,
}

/// Routes transport messages to handlers and the webhook queue.
pub struct EventRouter {
    prefix: String,
    registry: HandlerRegistry,
    webhook_tx: Option<WebhookEventSender>,
}

impl EventRouter {
    /// Create a new EventRouter.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Topic prefix the gateways publish under
    /// * `registry` - Handler registry used to persist events
    /// * `webhook_tx` - Webhook intake queue; `None` disables forwarding
    pub fn new(
        prefix: impl Into<String>,
        registry: HandlerRegistry,
        webhook_tx: Option<WebhookEventSender>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            registry,
            webhook_tx,
        }
    }

    /// The subscription covering every event topic under the prefix.
    pub fn subscription(&self) -> String {
        subscription_pattern(&self.prefix)
    }

    /// Handle one inbound message. Never fails.
    pub async fn route(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        let topic = match EventTopic::parse(&self.prefix, topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Dropping message on unrecognized topic");
                return RouteOutcome::Dropped;
            }
        };

        let payload = decode_payload(&topic.event_name, payload);
        let kind = EventKind::from_name(&topic.event_name);
        debug!(
            event_type = %topic.event_name,
            public_key = %topic.public_key,
            "Routing event"
        );

        let outcome = match self
            .registry
            .handle(&kind, &topic.public_key, &payload, OffsetDateTime::now_utc())
            .await
        {
            Ok(HandleOutcome::Persisted(p)) if p.event_inserted => RouteOutcome::Persisted,
            Ok(HandleOutcome::Persisted(_)) => RouteOutcome::Duplicate,
            Ok(HandleOutcome::Skipped) => RouteOutcome::Skipped,
            Err(e) => {
                error!(
                    event_type = %topic.event_name,
                    public_key = %topic.public_key,
                    error = %e,
                    "Failed to handle event"
                );
                RouteOutcome::Failed
            }
        };

        self.enqueue_webhook(WebhookEvent {
            event_type: topic.event_name,
            public_key: Some(topic.public_key),
            payload,
        });

        outcome
    }

    /// Hand the event to the webhook queue without waiting for space.
    fn enqueue_webhook(&self, event: WebhookEvent) {
        let Some(tx) = &self.webhook_tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    event_type = %event.event_type,
                    "Webhook queue full, dropping notification"
                );
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    event_type = %event.event_type,
                    "Webhook queue closed, dropping notification"
                );
            }
        }
    }
}

/// Parse the payload as JSON, keeping undecodable bytes as a lossy string so
/// the fallback log still captures them.
fn decode_payload(event_name: &str, payload: &[u8]) -> Value {
    serde_json::from_slice(payload).unwrap_or_else(|e| {
        warn!(event_type = %event_name, error = %e, "Payload is not valid JSON");
        Value::String(String::from_utf8_lossy(payload).into_owned())
    })
}
