//! # sync-client
//!
//! Client library for the dirsync directory reconciliation protocol.
//!
//! This is the library that keeps one local directory in step with a
//! dirsync server.
//!
//! ## Features
//!
//! - **Content-hash reconciliation**: only files whose content differs move
//! - **Transport Abstraction**: Pluggable transport layer (TCP, channels, mock)
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//! - **Status events**: `SyncEvent`s on a broadcast channel
//!
//! ## Example
//!
//! ```ignore
//! use sync_client::{ClientConfig, SyncClient, TcpTransport};
//!
//! let client = SyncClient::new(ClientConfig::new("./tools", "127.0.0.1:7400"), TcpTransport::new());
//!
//! // Send metadata, answer the server's differences, keep applying broadcasts
//! client.connect().await?;
//! client.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod transport;

pub use client::{ClientConfig, ClientError, Handled, SyncClient};
pub use transport::{ChannelTransport, MockTransport, TcpTransport, Transport, TransportError};
