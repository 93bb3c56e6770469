//! # dirsync
//!
//! Command-line tool for dirsync.
//!
//! ## Commands
//!
//! - `scan`: List a directory's files with their content hashes
//! - `diff`: Compare two local directories
//! - `sync`: Reconcile a directory with a server
//! - `serve`: Run a sync server
//!
//! ## Example
//!
//! ```bash
//! # Start a server for ./shared
//! dirsync serve --dir ./shared --bind 127.0.0.1:7400
//!
//! # Reconcile a local directory once
//! dirsync sync --server 127.0.0.1:7400 --dir ./tools
//!
//! # Stay connected and apply broadcasts as they arrive
//! dirsync sync --server 127.0.0.1:7400 --dir ./tools --watch
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{diff, scan, serve, sync};

/// Command-line tool for dirsync.
#[derive(Parser, Debug)]
#[command(name = "dirsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Print debug logs (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List files in a directory with their content hashes
    Scan {
        /// Directory to scan
        dir: PathBuf,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare two directories
    Diff {
        /// Directory treated as the local side
        local: PathBuf,

        /// Directory treated as the remote side
        remote: PathBuf,

        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile a directory with a server
    Sync {
        /// Server address (host:port)
        #[arg(long, short)]
        server: String,

        /// Directory to keep in sync
        #[arg(long, short)]
        dir: PathBuf,

        /// Stay connected and apply broadcasts until interrupted
        #[arg(long, short)]
        watch: bool,

        /// Prefix received files with a per-exchange token
        #[arg(long)]
        unique_prefix: bool,
    },

    /// Run a sync server
    Serve {
        /// Server configuration file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Directory to serve (overrides the config file)
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Bind address (overrides the config file)
        #[arg(long, short)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan { dir, json } => {
            scan::run(&dir, json).await?;
        }
        Commands::Diff {
            local,
            remote,
            json,
        } => {
            diff::run(&local, &remote, json).await?;
        }
        Commands::Sync {
            server,
            dir,
            watch,
            unique_prefix,
        } => {
            sync::run(&server, &dir, watch, unique_prefix).await?;
        }
        Commands::Serve { config, dir, bind } => {
            serve::run(config.as_deref(), dir, bind).await?;
        }
    }

    Ok(())
}
