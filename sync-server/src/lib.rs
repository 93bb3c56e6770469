//! # sync-server
//!
//! Directory reconciliation server for dirsync.
//!
//! This crate implements a server that:
//! - Accepts framed connections from many clients (TCP or in-memory)
//! - Compares each client's directory listing with its own directory
//! - Pushes the files a client lacks and requests the ones it lacks itself
//! - Rebroadcasts uploaded files to the other connected clients
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐                    ┌── Client B
//!            │   framed TCP       │
//!            ├───────────────────►│
//!            │                    │
//!        ┌───┴────────────────────┴───┐
//!        │        sync-server         │
//!        │  ┌─────────────────────┐   │
//!        │  │  server directory   │   │
//!        │  └─────────────────────┘   │
//!        └────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! - METADATA → DIFFERENCES (manifest + files the client lacks)
//! - CLIENT_FILES → BROADCAST (to every other client)
//!
//! A server refuses to start while another instance holds its lock file.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod lock;
pub mod memory;
pub mod policy;
pub mod server;
pub mod session;
pub mod tcp;
pub mod transport;

pub use config::{Config, ConfigError};
pub use error::{LinkError, ProtocolError, Result, ServerError};
pub use lock::InstanceLock;
pub use memory::{memory_listener, MemoryConnector, MemoryListener};
pub use policy::{policy_for, HashDiffIngest, IngestOutcome, IngestPolicy, VersionedIngest};
pub use server::{MetricsSnapshot, ServerMetrics, SyncServer};
pub use tcp::{serve_tcp, TcpFrameListener};
pub use transport::{IncomingConnection, Listener, PeerLink};
