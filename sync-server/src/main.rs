//! sync-server binary entry point.
//!
//! Usage:
//! ```bash
//! sync-server --config dirsync.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use sync_server::{serve_tcp, Config, SyncServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = get_config_path();
    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        tracing::info!("No config at {:?}, using defaults", config_path);
        Config::default()
    };

    let server = Arc::new(
        SyncServer::start(config)
            .await
            .context("failed to start sync server")?,
    );

    tokio::select! {
        result = serve_tcp(server.clone()) => result.context("listener failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    let metrics = server.metrics_snapshot();
    tracing::info!(
        "Final metrics: {}",
        serde_json::to_string(&metrics).unwrap_or_default()
    );
    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("dirsync.toml"))
}
