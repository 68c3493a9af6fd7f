//! Channel factories.

use super::types::WebhookEvent;
use tokio::sync::mpsc;

/// Buffer size of the webhook intake queue.
///
/// Bounded so a stalled dispatcher cannot grow memory without limit; the
/// router drops notifications when it is full rather than waiting.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for WebhookEvent events.
pub type WebhookEventSender = mpsc::Sender<WebhookEvent>;
/// Receiver handle for WebhookEvent events.
pub type WebhookEventReceiver = mpsc::Receiver<WebhookEvent>;

/// Create the webhook intake channel.
pub fn webhook_event_channel() -> (WebhookEventSender, WebhookEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
