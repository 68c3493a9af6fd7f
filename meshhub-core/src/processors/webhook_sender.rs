//! WebhookSender processor.
//!
//! The WebhookSender is responsible for:
//! - Draining `WebhookEvent` from the intake queue in small batches
//! - Selecting the enabled endpoints whose allow-list and filter match
//! - POSTing the JSON envelope, signed when the endpoint has a secret
//! - Retrying failed deliveries with exponential backoff
//!
//! The endpoint list lives in a [`ConfigStore`], so a reload swaps it
//! without restarting the loop.

use crate::config::{ConfigStore, ConfigWatcher, WebhookConfig};
use crate::events::{WebhookEvent, WebhookEventReceiver};
use futures_util::future::join_all;
use meshhub_sdk::objects::WebhookEnvelope;
use meshhub_sdk::signature::{SIGNATURE_HEADER, sign_body};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Maximum number of queued events dispatched together.
pub const BATCH_SIZE: usize = 16;

/// Errors that can occur during a single delivery attempt.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Transport error or timeout
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status
    #[error("webhook delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    /// A configured header name or value is not valid HTTP
    #[error("invalid header {0}")]
    InvalidHeader(String),
}

/// Delivers one event to every matching endpoint.
pub struct WebhookDispatcher {
    http_client: reqwest::Client,
    webhooks: ConfigStore<Vec<WebhookConfig>>,
}

impl WebhookDispatcher {
    pub fn new(webhooks: ConfigStore<Vec<WebhookConfig>>) -> Self {
        Self {
            // Timeouts are applied per request from each endpoint's config.
            http_client: reqwest::Client::builder()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            webhooks,
        }
    }

    pub fn webhooks(&self) -> &ConfigStore<Vec<WebhookConfig>> {
        &self.webhooks
    }

    /// Deliver the event to every enabled, matching endpoint concurrently.
    ///
    /// Returns whether each attempted endpoint eventually accepted the
    /// event, keyed by webhook name. Endpoints that did not match are absent.
    pub async fn dispatch(
        &self,
        event_type: &str,
        payload: &Value,
        public_key: Option<&str>,
    ) -> HashMap<String, bool> {
        let targets: Vec<WebhookConfig> = self
            .webhooks
            .read()
            .await
            .iter()
            .filter(|webhook| webhook.enabled && webhook.matches(event_type, payload))
            .cloned()
            .collect();
        if targets.is_empty() {
            return HashMap::new();
        }

        let envelope = WebhookEnvelope {
            event_type: event_type.to_string(),
            public_key: public_key.map(str::to_string),
            payload: payload.clone(),
        };
        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(e) => {
                error!(event_type = %event_type, error = %e, "Failed to serialize webhook envelope");
                return targets.into_iter().map(|w| (w.name, false)).collect();
            }
        };

        let results = join_all(targets.iter().map(|webhook| self.deliver(webhook, &body))).await;
        targets
            .into_iter()
            .map(|webhook| webhook.name)
            .zip(results)
            .collect()
    }

    /// Attempt delivery up to `1 + max_retries` times.
    async fn deliver(&self, webhook: &WebhookConfig, body: &str) -> bool {
        let mut attempt: u32 = 0;
        loop {
            match self.send_webhook(webhook, body).await {
                Ok(()) => {
                    debug!(webhook = %webhook.name, attempt, "Webhook delivered");
                    return true;
                }
                Err(e) if attempt >= webhook.max_retries => {
                    warn!(
                        webhook = %webhook.name,
                        attempts = attempt + 1,
                        error = %e,
                        "Webhook delivery failed, giving up"
                    );
                    return false;
                }
                Err(e) => {
                    let delay = webhook.backoff_for(attempt);
                    debug!(
                        webhook = %webhook.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Webhook delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Send the webhook HTTP request once.
    async fn send_webhook(&self, webhook: &WebhookConfig, body: &str) -> Result<(), WebhookError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &webhook.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|_| WebhookError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|_| WebhookError::InvalidHeader(name.to_string()))?;
            headers.insert(name, value);
        }
        if let Some(secret) = &webhook.secret {
            let invalid = || WebhookError::InvalidHeader(SIGNATURE_HEADER.to_string());
            let name = HeaderName::try_from(SIGNATURE_HEADER).map_err(|_| invalid())?;
            let value = HeaderValue::try_from(sign_body(body, secret)).map_err(|_| invalid())?;
            headers.insert(name, value);
        }

        let response = self
            .http_client
            .post(webhook.url.clone())
            .headers(headers)
            .timeout(webhook.timeout)
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(WebhookError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// WebhookSender consumes the intake queue and drives the dispatcher.
pub struct WebhookSender {
    dispatcher: Arc<WebhookDispatcher>,
    webhook_rx: WebhookEventReceiver,
    config_watcher: ConfigWatcher,
    shutdown_rx: watch::Receiver<bool>,
}

impl WebhookSender {
    /// Create a new WebhookSender.
    ///
    /// # Arguments
    ///
    /// * `dispatcher` - Delivers each event to its matching endpoints
    /// * `webhook_rx` - Receiver for WebhookEvent events
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub fn new(
        dispatcher: Arc<WebhookDispatcher>,
        webhook_rx: WebhookEventReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let config_watcher = dispatcher.webhooks().subscribe();
        Self {
            dispatcher,
            webhook_rx,
            config_watcher,
            shutdown_rx,
        }
    }

    /// Run the WebhookSender until shutdown or until every sender is gone.
    pub async fn run(mut self) {
        info!("WebhookSender started");

        let mut batch = Vec::with_capacity(BATCH_SIZE);
        let mut watching_config = true;

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("WebhookSender received shutdown signal");
                        break;
                    }
                }

                changed = self.config_watcher.changed(), if watching_config => {
                    match changed {
                        Ok(()) => {
                            let count = self.dispatcher.webhooks().read().await.len();
                            info!(count, "Webhook configuration reloaded");
                        }
                        Err(_) => watching_config = false,
                    }
                }

                received = self.webhook_rx.recv_many(&mut batch, BATCH_SIZE) => {
                    if received == 0 {
                        info!("WebhookEvent channel closed");
                        break;
                    }
                    debug!(count = received, "Dispatching webhook batch");
                    let events: Vec<WebhookEvent> = batch.drain(..).collect();
                    // Retry backoff can run long; do not hold up shutdown for it.
                    let mut shutdown_rx = self.shutdown_rx.clone();
                    tokio::select! {
                        biased;

                        Ok(_) = shutdown_rx.wait_for(|stop| *stop) => {
                            warn!(count = events.len(), "Shutdown during delivery, abandoning webhook batch");
                            break;
                        }

                        _ = self.dispatch_batch(&events) => {}
                    }
                }
            }
        }

        info!("WebhookSender shutdown complete");
    }

    async fn dispatch_batch(&self, events: &[WebhookEvent]) {
        let deliveries = events.iter().map(|event| {
            self.dispatcher.dispatch(
                &event.event_type,
                &event.payload,
                event.public_key.as_deref(),
            )
        });
        for (event, results) in events.iter().zip(join_all(deliveries).await) {
            let failed = results.values().filter(|ok| !**ok).count();
            if failed > 0 {
                warn!(
                    event_type = %event.event_type,
                    failed,
                    attempted = results.len(),
                    "Some webhooks were not delivered"
                );
            }
        }
    }
}
