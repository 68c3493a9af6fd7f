//! TOML file configuration structures.
//!
//! These structs directly map to the `meshhub-config.toml` file format.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub hashing: HashingConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port the health endpoint listens on.
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Broker connection section.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Topic prefix the gateways publish under.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_prefix() -> String {
    "meshcore".to_string()
}

fn default_client_id() -> String {
    "meshhub".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    /// Width of the time bucket used for advertisement and telemetry hashes.
    #[serde(default = "default_bucket_seconds")]
    pub bucket_seconds: i64,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            bucket_seconds: default_bucket_seconds(),
        }
    }
}

fn default_bucket_seconds() -> i64 {
    meshhub_core::hashing::DEFAULT_BUCKET_SECONDS
}

/// Retention section. Durations are whole seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub event_cleanup_enabled: bool,
    pub retention_days: u32,
    pub node_cleanup_enabled: bool,
    pub node_inactivity_days: u32,
    pub interval_secs: u64,
    pub check_interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        let defaults = meshhub_core::config::CleanupConfig::default();
        Self {
            event_cleanup_enabled: defaults.event_cleanup_enabled,
            retention_days: defaults.retention_days,
            node_cleanup_enabled: defaults.node_cleanup_enabled,
            node_inactivity_days: defaults.node_inactivity_days,
            interval_secs: defaults.interval.as_secs(),
            check_interval_secs: defaults.check_interval.as_secs(),
        }
    }
}

/// One `[[webhooks]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    pub url: String,
    /// Empty means every event type.
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Filter expression such as `$.channel_idx == 0`.
    pub filter: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Key for the `X-Meshhub-Signature` header.
    pub secret: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[mqtt]
host = "broker.local"
port = 8883
prefix = "mesh/eu"
username = "ingest"
password = "hunter2"

[hashing]
bucket_seconds = 600

[cleanup]
retention_days = 14
node_cleanup_enabled = true

[[webhooks]]
name = "discord"
url = "https://hooks.example.com/mesh"
event_types = ["channel_msg_recv"]
filter = "$.channel_idx == 0"
headers = { Authorization = "Bearer abc" }
max_retries = 5
secret = "s3cret"

[[webhooks]]
name = "archive"
url = "http://archive.internal/ingest"
enabled = false
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.prefix, "mesh/eu");
        assert_eq!(config.mqtt.client_id, "meshhub");
        assert_eq!(config.hashing.bucket_seconds, 600);
        assert_eq!(config.cleanup.retention_days, 14);
        assert!(config.cleanup.node_cleanup_enabled);
        assert!(config.cleanup.event_cleanup_enabled);
        assert_eq!(config.cleanup.interval_secs, 24 * 60 * 60);
        assert_eq!(config.webhooks.len(), 2);
        assert_eq!(
            config.webhooks[0].headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
        assert_eq!(config.webhooks[0].max_retries, Some(5));
        assert!(config.webhooks[0].enabled);
        assert!(!config.webhooks[1].enabled);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: FileConfig = toml::from_str("[mqtt]\nhost = \"localhost\"\n").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.prefix, "meshcore");
        assert_eq!(config.hashing.bucket_seconds, 300);
        assert_eq!(config.cleanup.retention_days, 30);
        assert!(!config.cleanup.node_cleanup_enabled);
        assert!(config.webhooks.is_empty());
    }
}
