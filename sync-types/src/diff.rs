//! Difference manifest exchanged in a `Differences` envelope.
//!
//! The manifest is a JSON object keyed by the fixed discriminants
//! `"-1"` (remote only), `"0"` (renamed) and `"1"` (local only). The
//! perspective is always that of the side that ran the comparison: when
//! the server compares itself (local) against a client (remote), `-1`
//! entries are files the server is asking the client to upload.

use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Partition discriminant of a [`DiffResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum DiffKey {
    /// Present remotely, missing locally.
    RemoteOnly = -1,
    /// Same content under a different name.
    Renamed = 0,
    /// Present locally, missing remotely.
    LocalOnly = 1,
}

impl TryFrom<i8> for DiffKey {
    type Error = CodecError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(DiffKey::RemoteOnly),
            0 => Ok(DiffKey::Renamed),
            1 => Ok(DiffKey::LocalOnly),
            _ => Err(CodecError::InvalidDiffKey(value)),
        }
    }
}

/// A file that exists on one side only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name on the side that has it.
    pub name: String,
    /// Content hash.
    pub content_hash: String,
}

/// A file whose content exists on both sides under different names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenameEntry {
    /// Name on the remote side.
    pub rename_from: String,
    /// Name on the local side.
    pub rename_to: String,
    /// Shared content hash.
    pub content_hash: String,
}

/// Three-way classification of two directory snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Files only the remote side has.
    #[serde(rename = "-1", default)]
    pub remote_only: Vec<FileEntry>,
    /// Files present on both sides under different names.
    #[serde(rename = "0", default)]
    pub renamed: Vec<RenameEntry>,
    /// Files only the local side has.
    #[serde(rename = "1", default)]
    pub local_only: Vec<FileEntry>,
}

impl DiffResult {
    /// True when all three partitions are empty.
    pub fn is_empty(&self) -> bool {
        self.remote_only.is_empty() && self.renamed.is_empty() && self.local_only.is_empty()
    }

    /// Number of entries in the given partition.
    pub fn count(&self, key: DiffKey) -> usize {
        match key {
            DiffKey::RemoteOnly => self.remote_only.len(),
            DiffKey::Renamed => self.renamed.len(),
            DiffKey::LocalOnly => self.local_only.len(),
        }
    }

    /// Distinct names from the remote-only partition, in manifest order.
    pub fn remote_only_names(&self) -> Vec<String> {
        distinct(self.remote_only.iter().map(|e| e.name.as_str()))
    }

    /// Distinct names from the local-only partition, in manifest order.
    pub fn local_only_names(&self) -> Vec<String> {
        distinct(self.local_only.iter().map(|e| e.name.as_str()))
    }

    /// Serialize as the JSON manifest.
    pub fn to_json(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse a JSON manifest.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
