//! # sync-types
//!
//! Wire format types for the dirsync directory reconciliation protocol.
//!
//! This crate provides the foundational types used across all dirsync crates:
//! - [`FileRecord`] - One file of a directory snapshot (name + content hash)
//! - [`ContentBlob`] - A named file payload travelling over the wire
//! - [`Envelope`] - Typed packet (`Metadata`, `Differences`, `ClientFiles`, `Broadcast`)
//! - [`DiffResult`] - Three-way classification of two snapshots
//! - [`Frame`] - Channel-tagged transport message
//! - [`ConnectionId`], [`SessionToken`] - Identity types
//! - [`CodecError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blob;
mod diff;
mod envelope;
mod error;
mod frame;
mod ids;
mod record;

pub use blob::{ContentBlob, DEFAULT_VERSION, XML_DECLARATION};
pub use diff::{DiffKey, DiffResult, FileEntry, RenameEntry};
pub use envelope::{Envelope, PacketType, DIFF_MANIFEST_FILE, METADATA_FILE, PROTOCOL_VERSION};
pub use error::CodecError;
pub use frame::{read_frame, write_frame, Frame, DEFAULT_MAX_FRAME_SIZE, FILE_TRANSFER_CHANNEL};
pub use ids::{ConnectionId, SessionToken};
pub use record::FileRecord;
