use std::error::Error;
use std::sync::Arc;

use kline_proxy::{router, AppState, HttpUpstream, ProxyConfig};
use rustls::crypto::ring::default_provider;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    // Initialize logging
    init_logging();

    let config = ProxyConfig::from_env()?;
    info!(
        "Starting kline proxy with {} upstreams (timeout {:?}, cache hint {:?})",
        config.upstreams.len(),
        config.upstream_timeout,
        config.cache_ttl
    );

    let client = reqwest::Client::builder().build()?;
    let upstream = HttpUpstream::new(client, config.upstream_timeout, config.cache_ttl);
    let app = router(AppState::new(Arc::new(upstream), config.upstreams.clone()));

    let listener = TcpListener::bind(config.addr).await?;
    info!("Kline proxy listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Kline proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
