//! Error types for sync-server.

use std::path::PathBuf;

use sync_store::StorageError;
use sync_types::{CodecError, ConnectionId, PacketType};

/// Main error type for sync-server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Another server instance holds the lock.
    #[error("another server instance is already running (lock: {})", path.display())]
    AlreadyRunning {
        /// Lock file path.
        path: PathBuf,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Sending to a peer failed.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// No registered connection has this id.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A packet type only the server sends arrived at the server.
    #[error("unexpected {0:?} envelope from a client")]
    UnexpectedPacket(PacketType),

    /// Frame payload exceeds the configured limit.
    #[error("message too large: {size} bytes (limit: {limit} bytes)")]
    MessageTooLarge {
        /// Actual payload size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Errors from a single peer link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The peer has gone away.
    #[error("link closed")]
    Closed,

    /// Writing to the peer failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The peer did not accept the frame in time.
    #[error("send timed out")]
    TimedOut,
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ServerError::AlreadyRunning {
            path: PathBuf::from("/tmp/dirsync.lock"),
        };
        assert_eq!(
            err.to_string(),
            "another server instance is already running (lock: /tmp/dirsync.lock)"
        );

        let err: ServerError = ProtocolError::UnexpectedPacket(PacketType::Broadcast).into();
        assert_eq!(
            err.to_string(),
            "protocol error: unexpected Broadcast envelope from a client"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServerError>();
    }
}
