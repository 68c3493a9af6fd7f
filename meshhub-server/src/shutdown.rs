//! Signal handling for graceful shutdown and config reload.

use crate::config::ConfigLoader;
use meshhub_core::config::{ConfigStore, WebhookConfig};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Completes when SIGTERM or SIGINT (Ctrl+C) is received.
pub async fn shutdown_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to install signal handlers: {}, falling back to Ctrl+C", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Spawns a task that reloads the webhook list on SIGHUP.
///
/// Only `[[webhooks]]` is applied at runtime; other sections take effect on
/// the next start.
pub fn spawn_config_reload_handler(
    config_loader: Arc<ConfigLoader>,
    webhooks: ConfigStore<Vec<WebhookConfig>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!("Failed to install SIGHUP handler: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            let count = loaded_config.webhooks.len();
                            webhooks.update(loaded_config.webhooks).await;
                            tracing::info!(
                                webhooks = count,
                                version = webhooks.version(),
                                "Webhook configuration reloaded"
                            );
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::debug!("Config reload handler shutting down");
                        break;
                    }
                }
            }
        }
    })
}
