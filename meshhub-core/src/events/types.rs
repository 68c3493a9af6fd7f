use meshhub_sdk::objects::WebhookEnvelope;
use serde_json::Value;

/// An ingested event queued for webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    /// Event name from the topic, e.g. `advertisement`.
    pub event_type: String,
    /// Gateway that published the event.
    pub public_key: Option<String>,
    pub payload: Value,
}

impl WebhookEvent {
    pub fn to_envelope(&self) -> WebhookEnvelope {
        WebhookEnvelope {
            event_type: self.event_type.clone(),
            public_key: self.public_key.clone(),
            payload: self.payload.clone(),
        }
    }
}
