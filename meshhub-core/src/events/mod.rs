//! Events passed between the ingestion path and background processors.
//!
//! Flow:
//!
//! 1. MQTT publish -> `EventRouter` (persists through the handler registry)
//! 2. `EventRouter` emits `WebhookEvent` -> `WebhookSender`
//!
//! The cleanup scheduler runs on its own timer and takes no events.

pub mod channels;
pub mod types;

pub use channels::{
    webhook_event_channel, WebhookEventReceiver, WebhookEventSender, DEFAULT_CHANNEL_BUFFER,
};
pub use types::WebhookEvent;
