//! # sync-store
//!
//! Flat-directory storage for dirsync.
//!
//! This crate owns everything that touches the synchronized directory:
//!
//! - [`hash_file`] / [`hash_bytes`] - SHA-256 content digests (lowercase hex)
//! - [`generate`] / [`try_generate`] - directory snapshots as [`FileRecord`](sync_types::FileRecord) lists
//! - [`FileStore`] - validated, atomic reads and writes of named files
//!
//! ## Example
//!
//! ```rust,ignore
//! use dirsync_store::{FileStore, StorageError};
//! use sync_types::ContentBlob;
//!
//! # async fn example() -> Result<(), StorageError> {
//! let store = FileStore::new("/srv/sync");
//! store.ensure_dir().await?;
//!
//! let stored = store.write_blob(&ContentBlob::encode("a.txt", b"hello"), None).await?;
//! let snapshot = store.snapshot().await;
//! assert_eq!(snapshot[0].name, stored);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod metadata;
mod store;

pub use error::StorageError;
pub use hash::{hash_bytes, hash_file};
pub use metadata::{generate, is_excluded, try_generate};
pub use store::{validate_name, FileStore, WriteReport, TEMP_PREFIX};
