use std::sync::Arc;

use anyhow::{Context, Result};
use bus_tracking::provider::MemoryStore;
use bus_tracking::{config, http};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trip_tracker::{Config, Tracker};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store_url = config::get_store_url();
    let store = MemoryStore::from_url(&store_url)
        .with_context(|| format!("opening store {store_url}"))?;
    let tracker = Tracker::new(Arc::new(Config::from_env()), store);

    let port = config::get_port();
    let listener =
        TcpListener::bind(("0.0.0.0", port)).await.with_context(|| format!("binding port {port}"))?;
    info!(port, "bus tracking service listening");

    axum::serve(listener, http::router(tracker))
        .with_graceful_shutdown(shutdown())
        .await
        .context("serving http")?;

    info!("bus tracking service stopped");
    Ok(())
}

async fn shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
