//! MQTT ingestion loop.
//!
//! Polls the rumqttc event loop, subscribes on every `ConnAck` (sessions are
//! clean, so subscriptions do not survive a reconnect) and awaits the router
//! for each publish before polling again.

use crate::config::MqttSettings;
use meshhub_core::processors::EventRouter;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Delay after a failed poll before rumqttc reconnects.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
/// Capacity of the client request queue.
const REQUEST_CAPACITY: usize = 64;
/// How long to keep polling after a disconnect request so it is flushed.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

pub struct MqttIngest {
    settings: MqttSettings,
    router: EventRouter,
    connected_tx: watch::Sender<bool>,
}

impl MqttIngest {
    /// Create the ingestion loop.
    ///
    /// # Arguments
    ///
    /// * `settings` - Broker connection settings
    /// * `router` - Routes each publish to persistence and webhooks
    /// * `connected_tx` - Reports broker connectivity to the health endpoint
    pub fn new(
        settings: MqttSettings,
        router: EventRouter,
        connected_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            settings,
            router,
            connected_tx,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            self.settings.host.clone(),
            self.settings.port,
        );
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &self.settings.credentials {
            options.set_credentials(username.clone(), password.clone());
        }
        options
    }

    /// Run until shutdown, then disconnect from the broker.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let subscription = self.router.subscription();
        info!(
            host = %self.settings.host,
            port = self.settings.port,
            subscription = %subscription,
            "MQTT ingest started"
        );

        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("MQTT ingest received shutdown signal");
                        break;
                    }
                }

                notification = eventloop.poll() => match notification {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code != ConnectReturnCode::Success {
                            warn!(code = ?ack.code, "Broker refused connection");
                            continue;
                        }
                        info!("Connected to MQTT broker");
                        self.connected_tx.send_replace(true);
                        if let Err(e) = client.try_subscribe(subscription.as_str(), QoS::AtLeastOnce) {
                            error!(error = %e, "Failed to queue subscription");
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        debug!(return_codes = ?ack.return_codes, "Subscription acknowledged");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.router.route(&publish.topic, &publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if self.connected_tx.send_replace(false) {
                            warn!(error = %e, "Lost connection to MQTT broker");
                        } else {
                            warn!(error = %e, "MQTT connection attempt failed");
                        }
                        if !backoff(&mut shutdown_rx).await {
                            break;
                        }
                    }
                }
            }
        }

        self.connected_tx.send_replace(false);
        disconnect(&client, &mut eventloop).await;
        info!("MQTT ingest shutdown complete");
    }
}

/// Sleep before the next reconnect attempt. Returns `false` if shutdown was
/// requested meanwhile.
async fn backoff(shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(RECONNECT_BACKOFF) => true,
        result = shutdown_rx.wait_for(|stop| *stop) => result.is_err(),
    }
}

async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "Failed to queue disconnect");
        return;
    }
    let flush = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };
    if tokio::time::timeout(DISCONNECT_GRACE, flush).await.is_err() {
        debug!("Broker disconnect not flushed in time");
    }
}
