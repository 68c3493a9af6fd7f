//! Application state shared across all request handlers.

use meshhub_core::processors::LastRun;
use tokio::sync::watch;

/// Application state shared by the health endpoint.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    /// Whether the MQTT loop currently holds a broker connection.
    pub mqtt_connected: watch::Receiver<bool>,
    /// Completion time of the last successful cleanup pass.
    pub last_cleanup: LastRun,
}

impl AppState {
    pub fn new(mqtt_connected: watch::Receiver<bool>, last_cleanup: LastRun) -> Self {
        Self {
            mqtt_connected,
            last_cleanup,
        }
    }

    pub fn is_mqtt_connected(&self) -> bool {
        *self.mqtt_connected.borrow()
    }
}
