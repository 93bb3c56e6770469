//! # sync-core
//!
//! Pure logic for dirsync (no I/O, instant tests).
//!
//! This crate implements the snapshot comparison, the client state
//! machine and the version rules without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (network, disk) is performed by `sync-client` and
//! `sync-server`, which interpret the results produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod events;
pub mod policy;
pub mod state;
pub mod version;

pub use diff::compare;
pub use events::SyncEvent;
pub use policy::{PolicyKind, UnknownPolicy};
pub use state::{Action, ClientState, Event};
pub use version::{
    is_newer, remove_version_suffix, standardize_file_name, VersionDecision, VersionLedger,
};
