//! Axum server setup and router configuration.

use crate::state::AppState;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    mqtt_connected: bool,
    /// RFC 3339 time of the last successful cleanup pass.
    last_cleanup: Option<String>,
}

/// Reports `degraded` while the broker connection is down.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mqtt_connected = state.is_mqtt_connected();
    let last_cleanup =
        (*state.last_cleanup.read().await).and_then(|at| at.format(&Rfc3339).ok());

    Json(HealthResponse {
        status: if mqtt_connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        mqtt_connected,
        last_cleanup,
    })
}

/// Run the server until `shutdown` completes.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
