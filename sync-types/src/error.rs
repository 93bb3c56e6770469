//! Error types for the dirsync wire format.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum CodecError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed (truncated or malformed input)
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Invalid packet type discriminator
    #[error("invalid packet type: {0}")]
    InvalidPacketType(u8),

    /// Invalid diff partition discriminant
    #[error("invalid diff key: {0}")]
    InvalidDiffKey(i8),

    /// Invalid protocol version
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// A blob payload claimed to be base64 but was not
    #[error("invalid blob payload for {name}: {reason}")]
    InvalidPayload {
        /// Name of the offending blob.
        name: String,
        /// Decoder message.
        reason: String,
    },

    /// A JSON manifest (metadata or differences) could not be read or written
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Envelope did not have the shape its packet type requires
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Frame length prefix exceeded the configured limit
    #[error("frame too large: {size} bytes (limit: {limit} bytes)")]
    FrameTooLarge {
        /// Announced frame size.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// I/O error while reading or writing a frame
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}
