//! Transport abstraction for dirsync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying connection mechanism (TCP, in-process channels, mock for
//! testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `send()` transmits a payload on a named channel
//! - `recv()` receives the next [`Frame`]
//! - `close()` gracefully terminates
//!
//! Frames carry their channel; callers drop frames on channels they do not
//! listen to.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("127.0.0.1:7400").await?;
//! transport.send(FILE_TRANSFER_CHANNEL, &envelope_bytes).await?;
//! let frame = transport.recv().await?;
//! ```

mod channel;
mod mock;
mod tcp;

pub use channel::ChannelTransport;
pub use mock::MockTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use sync_types::{CodecError, Frame};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Framing error on a byte stream.
    #[error("framing error: {0}")]
    Framing(#[from] CodecError),
}

/// Transport trait for sending and receiving dirsync frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the server at `address`.
    ///
    /// For TCP this is `host:port`. Pre-wired transports ignore it.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send a payload on `channel`.
    async fn send(&self, channel: &str, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame.
    ///
    /// Blocks until a frame is available or the connection closes.
    async fn recv(&self) -> Result<Frame, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
