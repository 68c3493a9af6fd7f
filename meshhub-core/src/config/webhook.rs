//! Webhook endpoint configuration.

use crate::filter::{Filter, FilterParseError};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// One outbound webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Unique name; keys the per-endpoint result of a dispatch.
    pub name: String,
    pub url: Url,
    /// Allow-list of event types. Empty means every type.
    pub event_types: Vec<String>,
    pub filter: Option<WebhookFilter>,
    /// Extra request headers, applied after `Content-Type`.
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_backoff * 2^n` before the next.
    pub retry_backoff: Duration,
    pub enabled: bool,
    /// HMAC key for the signature header, if any.
    pub secret: Option<Box<[u8]>>,
}

impl WebhookConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
            event_types: Vec::new(),
            filter: None,
            headers: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
            enabled: true,
            secret: None,
        }
    }

    /// Whether an event of `event_type` with `payload` should be delivered
    /// here. Ignores `enabled`.
    pub fn matches(&self, event_type: &str, payload: &Value) -> bool {
        if !self.event_types.is_empty() && !self.event_types.iter().any(|t| t == event_type) {
            return false;
        }
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.matches(payload))
    }

    /// Delay to wait after failed attempt number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// A filter expression, parsed once.
///
/// An expression that fails to parse matches everything.
#[derive(Debug, Clone)]
pub struct WebhookFilter {
    expression: String,
    parsed: Result<Filter, FilterParseError>,
}

impl WebhookFilter {
    pub fn new(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        let parsed = expression.parse::<Filter>();
        if let Err(e) = &parsed {
            warn!(
                filter = %expression,
                error = %e,
                "Invalid webhook filter, it will match every event"
            );
        }
        Self { expression, parsed }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_ok()
    }

    pub fn matches(&self, payload: &Value) -> bool {
        match &self.parsed {
            Ok(filter) => filter.evaluate(payload),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn webhook() -> WebhookConfig {
        WebhookConfig::new("test", Url::parse("http://127.0.0.1:9/hook").unwrap())
    }

    #[test]
    fn test_event_type_allow_list() {
        let mut config = webhook();
        assert!(config.matches("anything", &json!({})));

        config.event_types = vec!["advertisement".to_string()];
        assert!(config.matches("advertisement", &json!({})));
        assert!(!config.matches("channel_msg_recv", &json!({})));
    }

    #[test]
    fn test_filter_is_applied_after_allow_list() {
        let mut config = webhook();
        config.event_types = vec!["channel_msg_recv".to_string()];
        config.filter = Some(WebhookFilter::new("$.channel_idx == 0"));

        assert!(config.matches("channel_msg_recv", &json!({"channel_idx": 0})));
        assert!(!config.matches("channel_msg_recv", &json!({"channel_idx": 1})));
        assert!(!config.matches("advertisement", &json!({"channel_idx": 0})));
    }

    #[test]
    fn test_unparseable_filter_fails_open() {
        let mut config = webhook();
        config.filter = Some(WebhookFilter::new("this is not a filter"));
        assert!(!config.filter.as_ref().unwrap().is_valid());

        for payload in [json!({}), json!({"a": 1}), json!(null), json!("raw")] {
            assert!(config.matches("advertisement", &payload));
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let mut config = webhook();
        config.retry_backoff = Duration::from_millis(100);
        assert_eq!(config.backoff_for(0), Duration::from_millis(100));
        assert_eq!(config.backoff_for(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(800));
        assert!(config.backoff_for(64) >= config.backoff_for(31));
    }
}
