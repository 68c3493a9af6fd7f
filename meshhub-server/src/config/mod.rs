//! Configuration module for meshhub-server.
//!
//! Handles loading configuration from the TOML file, CLI overrides and
//! environment variables, and converting it into the runtime types of
//! `meshhub-core`.

pub mod file;

use crate::config::file::{FileConfig, WebhookConfig as FileWebhookConfig};
use meshhub_core::config::{CleanupConfig, WebhookConfig, WebhookFilter};
use meshhub_core::hashing::HashEngine;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub prefix: String,
    pub client_id: String,
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub mqtt: MqttSettings,
    pub hash: HashEngine,
    pub cleanup: CleanupConfig,
    pub webhooks: Vec<WebhookConfig>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        Self::parse(&config_content, self.listen_override)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn parse(
        content: &str,
        listen_override: Option<SocketAddr>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        build_loaded_config(file_config)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let prefix = &config.mqtt.prefix;
    if prefix.is_empty() || prefix.contains(['+', '#']) || prefix.ends_with('/') {
        return Err(invalid(format!(
            "mqtt prefix {prefix:?} must be non-empty, without wildcards or a trailing slash"
        )));
    }
    // rumqttc rejects keep-alive intervals below five seconds.
    if config.mqtt.keep_alive_secs < 5 {
        return Err(invalid("mqtt keep_alive_secs must be at least 5"));
    }
    if config.mqtt.username.is_some() != config.mqtt.password.is_some() {
        return Err(invalid("mqtt username and password must be set together"));
    }

    if config.hashing.bucket_seconds <= 0 {
        return Err(invalid("hashing bucket_seconds must be positive"));
    }

    let cleanup = &config.cleanup;
    if cleanup.retention_days == 0 || cleanup.node_inactivity_days == 0 {
        return Err(invalid("cleanup retention periods must be positive"));
    }
    if cleanup.check_interval_secs == 0 {
        return Err(invalid("cleanup check_interval_secs must be positive"));
    }

    let mut names = HashSet::new();
    for webhook in &config.webhooks {
        if !names.insert(webhook.name.as_str()) {
            return Err(invalid(format!("duplicate webhook name {:?}", webhook.name)));
        }
        parse_webhook_url(webhook)?;
    }
    Ok(())
}

fn parse_webhook_url(webhook: &FileWebhookConfig) -> Result<Url, ConfigError> {
    let url = Url::parse(&webhook.url)
        .map_err(|e| invalid(format!("webhook {} has an invalid url: {e}", webhook.name)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "webhook {} url must use http or https",
            webhook.name
        )));
    }
    Ok(url)
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let mqtt = file_config.mqtt;
    let credentials = mqtt.username.zip(mqtt.password);
    let cleanup = file_config.cleanup;

    let webhooks = file_config
        .webhooks
        .into_iter()
        .map(convert_webhook)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoadedConfig {
        listen: file_config.server.listen,
        mqtt: MqttSettings {
            host: mqtt.host,
            port: mqtt.port,
            prefix: mqtt.prefix,
            client_id: mqtt.client_id,
            credentials,
            keep_alive: Duration::from_secs(mqtt.keep_alive_secs),
        },
        hash: HashEngine::new(file_config.hashing.bucket_seconds),
        cleanup: CleanupConfig {
            event_cleanup_enabled: cleanup.event_cleanup_enabled,
            retention_days: cleanup.retention_days,
            node_cleanup_enabled: cleanup.node_cleanup_enabled,
            node_inactivity_days: cleanup.node_inactivity_days,
            interval: Duration::from_secs(cleanup.interval_secs),
            check_interval: Duration::from_secs(cleanup.check_interval_secs),
        },
        webhooks,
    })
}

fn convert_webhook(w: FileWebhookConfig) -> Result<WebhookConfig, ConfigError> {
    let url = parse_webhook_url(&w)?;
    let mut config = WebhookConfig::new(w.name, url);
    config.event_types = w.event_types;
    config.filter = w.filter.map(WebhookFilter::new);
    config.headers = w.headers.into_iter().collect();
    if let Some(secs) = w.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(retries) = w.max_retries {
        config.max_retries = retries;
    }
    if let Some(ms) = w.retry_backoff_ms {
        config.retry_backoff = Duration::from_millis(ms);
    }
    config.enabled = w.enabled;
    config.secret = w.secret.map(|s| s.into_bytes().into_boxed_slice());
    Ok(config)
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
