// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::aggregate_store::AggregateStore;
use crate::application::connection_controller::ConnectionController;
use crate::infrastructure::config::load_telemetry_config;
use crate::infrastructure::transport_selector::ConfiguredSelector;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    clear_telemetry, connect, connection_status, disconnect, get_spectrum, get_telemetry,
    get_throughput, health_check, send_commands, stream_telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_telemetry_config().context("Failed to load telemetry configuration")?;

    // Create aggregates and the connection controller (application layer)
    let store = AggregateStore::new(config.aggregate.limits());
    let selector = Arc::new(ConfiguredSelector::new(config.transport.clone()));
    let controller = Arc::new(
        ConnectionController::new(selector, store, config.aggregate.reset_on_disconnect)
            .with_connect_timeout(config.transport.connect_timeout()),
    );

    // Create application state
    let state = Arc::new(AppState {
        controller: controller.clone(),
        stream_interval: Duration::from_millis(config.server.stream_interval_ms),
    });

    // Build router (presentation layer)
    // Note: JSON responses are Brotli-encoded by hand, so no CompressionLayer here
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/telemetry", get(get_telemetry).delete(clear_telemetry))
        .route("/telemetry/throughput", get(get_throughput))
        .route("/telemetry/spectrum", get(get_spectrum))
        .route("/telemetry/stream", get(stream_telemetry))
        .route("/connection", get(connection_status))
        .route("/connection/connect", post(connect))
        .route("/connection/disconnect", post(disconnect))
        .route("/commands", post(send_commands))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting rf-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release the device link before exiting
    controller.disconnect().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
