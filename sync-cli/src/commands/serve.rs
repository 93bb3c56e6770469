//! Serve command - run a sync server over TCP.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync_server::{serve_tcp, Config, SyncServer};

/// Build the server configuration from a file and command-line overrides.
fn load_config(path: Option<&Path>, dir: Option<PathBuf>, bind: Option<String>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(dir) = dir {
        config.server.directory = dir;
    }
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    Ok(config)
}

/// Run the serve command until Ctrl-C.
pub async fn run(path: Option<&Path>, dir: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let config = load_config(path, dir, bind)?;
    tracing::debug!(?config, "Loaded server configuration");
    let bind = config.server.bind_address.clone();
    let directory = config.server.directory.clone();

    let server = Arc::new(
        SyncServer::start(config)
            .await
            .context("Failed to start sync server")?,
    );

    println!("Serving {} on {}", directory.display(), bind);
    println!("Press Ctrl-C to stop");

    tokio::select! {
        result = serve_tcp(server.clone()) => result.context("Listener failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    let metrics = server.metrics_snapshot();
    println!(
        "Stopped after {} connection(s), {} file(s) received, {} broadcast(s)",
        metrics.connections_total, metrics.files_received, metrics.broadcasts_total
    );
    Ok(())
}
