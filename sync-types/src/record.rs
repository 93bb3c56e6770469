//! Directory snapshot records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One file in a directory snapshot.
///
/// Records are recomputed on every synchronization pass and never persisted
/// between runs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name, relative to the synchronized directory.
    pub name: String,
    /// Lowercase hex SHA-256 digest of the file content.
    pub content_hash: String,
}

impl FileRecord {
    /// Create a new record.
    pub fn new(name: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_hash: content_hash.into(),
        }
    }
}

impl fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.content_hash.get(..12).unwrap_or(&self.content_hash);
        write!(f, "FileRecord({}, {})", self.name, short)
    }
}
