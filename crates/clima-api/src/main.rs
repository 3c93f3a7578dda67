use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Observability
    clima_obs::init("clima-api");

    // Config
    let cfg = clima_config::AppConfig::load().context("failed to load configuration")?;

    let shutdown = CancellationToken::new();
    let service = clima_api::build_service(&cfg, shutdown.clone()).await?;
    let (app, state) = clima_api::build_app(Arc::new(service), shutdown.clone())?;

    let addr: SocketAddr = cfg
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", cfg.server.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Mark ready just before serving
    clima_api::set_ready(&state, true);

    info!(%addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on ctrl-c and cancels in-flight ingestions
async fn wait_for_shutdown(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = ?e, "failed to listen for shutdown signal");
        // Keep serving; only an explicit cancel stops the server now
        shutdown.cancelled().await;
        return;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
