//! CLI command implementations.

pub mod diff;
pub mod scan;
pub mod serve;
pub mod sync;
