//! Error types for sync-store.

use std::path::PathBuf;

use sync_types::CodecError;
use thiserror::Error;

/// Errors that can occur during file store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The synchronized directory does not exist.
    #[error("directory not found: {}", path.display())]
    DirectoryNotFound {
        /// Missing directory.
        path: PathBuf,
    },

    /// A named file is not in the store.
    #[error("file not found: {name}")]
    NotFound {
        /// Requested file name.
        name: String,
    },

    /// A blob name is not a flat file name.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidName {
        /// Offending name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Blob payload could not be decoded or a manifest encoded.
    #[error("payload error: {0}")]
    Payload(#[from] CodecError),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
