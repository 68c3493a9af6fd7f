//! The JSON body POSTed to every webhook endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope wrapping one ingested event.
///
/// `public_key` is the gateway that reported the event; it is `null` only
/// when the event did not originate from a parsed topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event_type: String,
    pub public_key: Option<String>,
    pub payload: Value,
}
