//! Sync command - reconcile a directory with a server over TCP.

use anyhow::{Context, Result};
use std::path::Path;
use sync_client::{ClientConfig, SyncClient, TcpTransport};

/// Run the sync command.
///
/// Performs one reconciliation exchange. With `watch`, stays connected and
/// applies broadcasts until the server closes the connection or Ctrl-C.
pub async fn run(server: &str, dir: &Path, watch: bool, unique_prefix: bool) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config = ClientConfig::new(dir, server).with_unique_prefix(unique_prefix);
    let client = SyncClient::new(config, TcpTransport::new());

    client
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", server))?;
    tracing::info!(server, dir = %dir.display(), "Reconciling");
    let handled = client
        .sync_once()
        .await
        .context("Reconciliation failed")?;
    tracing::debug!(
        written = handled.written.len(),
        uploaded = handled.uploaded.len(),
        "Reconciliation finished"
    );

    println!(
        "Received {} file(s), uploaded {} file(s)",
        handled.written.len(),
        handled.uploaded.len()
    );
    for name in &handled.written {
        println!("  <- {}", name);
    }
    for name in &handled.uploaded {
        println!("  -> {}", name);
    }

    if !watch {
        client.disconnect().await?;
        return Ok(());
    }

    println!("Watching for broadcasts (Ctrl-C to stop)...");
    tokio::select! {
        result = client.run() => result.context("Connection lost")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, disconnecting");
            client.disconnect().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn unreachable_server_fails() {
        let dir = tempdir().unwrap();
        // Port 1 on localhost is not listening
        let result = run("127.0.0.1:1", dir.path(), false, false).await;
        assert!(result.is_err());
    }
}
