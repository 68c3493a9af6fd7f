//! Meshhub Server
//!
//! Ingests mesh network events from an MQTT broker into PostgreSQL and
//! forwards them to webhooks.

mod config;
mod mqtt;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use meshhub_core::config::ConfigStore;
use meshhub_core::events::webhook_event_channel;
use meshhub_core::framework::DatabaseProcessor;
use meshhub_core::handlers::HandlerRegistry;
use meshhub_core::processors::{CleanupScheduler, EventRouter, WebhookDispatcher, WebhookSender};
use mqtt::MqttIngest;
use server::{build_router, run_server};
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on waiting for background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Meshhub - mesh network event ingestion
#[derive(Parser, Debug)]
#[command(name = "meshhub-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./meshhub-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "MESHHUB_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments first, the log format depends on them
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting meshhub-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let store = Arc::new(DatabaseProcessor::new(db_pool.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // The MQTT loop stops first so nothing new is queued while the rest drains.
    let (mqtt_stop_tx, mqtt_stop_rx) = watch::channel(false);

    // Webhook delivery
    let webhooks = ConfigStore::new(loaded_config.webhooks);
    let (webhook_tx, webhook_rx) = webhook_event_channel();
    let dispatcher = Arc::new(WebhookDispatcher::new(webhooks.clone()));
    let webhook_handle = tokio::spawn(
        WebhookSender::new(dispatcher, webhook_rx, shutdown_rx.clone()).run(),
    );

    // Retention
    let cleanup = CleanupScheduler::new(store.clone(), loaded_config.cleanup);
    let last_cleanup = cleanup.last_run();
    let cleanup_handle = tokio::spawn(cleanup.run(shutdown_rx.clone()));

    // Ingestion
    let registry = HandlerRegistry::new(store, loaded_config.hash);
    let router = EventRouter::new(
        loaded_config.mqtt.prefix.clone(),
        registry,
        Some(webhook_tx),
    );
    let (connected_tx, connected_rx) = watch::channel(false);
    let mqtt_handle = tokio::spawn(
        MqttIngest::new(loaded_config.mqtt, router, connected_tx).run(mqtt_stop_rx),
    );

    // Spawn config reload handler (listens for SIGHUP)
    let reload_handle =
        spawn_config_reload_handler(config_loader, webhooks, shutdown_rx.clone());

    // Run the health server until a shutdown signal arrives
    let state = AppState::new(connected_rx, last_cleanup);
    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(build_router(state), loaded_config.listen, shutdown_signal()).await;

    // Ordered shutdown: ingestion, then background loops, then the pool
    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    let _ = mqtt_stop_tx.send(true);
    join_task("mqtt", mqtt_handle, deadline).await;

    let _ = shutdown_tx.send(true);
    join_task("webhook_sender", webhook_handle, deadline).await;
    join_task("cleanup", cleanup_handle, deadline).await;
    join_task("config_reload", reload_handle, deadline).await;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Wait for a background task, giving up at `deadline`.
async fn join_task(name: &'static str, handle: JoinHandle<()>, deadline: Instant) {
    match tokio::time::timeout_at(deadline, handle).await {
        Ok(Ok(())) => tracing::debug!(task = name, "Task stopped"),
        Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task failed"),
        Err(_) => tracing::warn!(task = name, "Task did not stop before the shutdown timeout"),
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,rumqttc=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
