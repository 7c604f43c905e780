use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ical_gate::{
    AppState, ExpiringCache, GateConfig, GateLayer, IcalValidator, build_router, metrics, utils,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting ical-gate v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration; a malformed subnet or header name fails here
    let config = GateConfig::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        header = %config.header_name,
        allow_subnet = %config.allow_subnet,
        freshness_secs = config.freshness.as_secs(),
        "Configuration loaded"
    );

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    } else {
        info!("Metrics disabled (METRICS_PORT=0)");
    }

    // Gate collaborators: the cache handle is kept for teardown
    let cache = ExpiringCache::new(config.freshness, config.sweep_interval);
    let validator = IcalValidator::new(&config.validation_base_url, config.validation_timeout)
        .map_err(|e| {
            error!("Failed to build validator: {e}");
            exitcode::CONFIG
        })?;
    let gate = GateLayer::new(&config, validator, cache.clone()).map_err(|e| {
        error!("Failed to build gate: {e}");
        exitcode::CONFIG
    })?;

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;

    let app = build_router(AppState::new(config), gate);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Gate listening on http://{addr}");
    info!("  GET /health  - Health check (unprotected)");
    info!("  *            - Protected by the authorization gate");

    // ConnectInfo supplies the transport peer address the classifier falls
    // back to when no proxy headers are present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("HTTP server stopped, shutting down cache...");
    cache.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
