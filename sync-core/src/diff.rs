//! Directory snapshot comparison.
//!
//! Content hash, not name, is the identity of a file. Two snapshots are
//! classified into three partitions:
//!
//! - remote only: a remote hash with no local counterpart
//! - renamed: a remote hash that exists locally under a different name
//! - local only: a local hash with no remote counterpart
//!
//! A file stored under the same name and hash on both sides appears in no
//! partition. A renamed file is never also reported as remote or local only.
//!
//! Duplicate hashes within one snapshot collapse to a single hash→name
//! entry (the last record wins). Two identical files under different names
//! on the same side therefore report at most one rename target.

use std::collections::HashMap;

use sync_types::{DiffResult, FileEntry, FileRecord, RenameEntry};

/// Classify `remote` against `local`.
///
/// Runs in O(n + m) over the two snapshots. Output order follows input
/// order: renamed and remote-only entries in `remote` order, local-only
/// entries in `local` order.
pub fn compare(local: &[FileRecord], remote: &[FileRecord]) -> DiffResult {
    let local_by_hash = index_by_hash(local);
    let remote_by_hash = index_by_hash(remote);

    let mut diff = DiffResult::default();

    for record in remote {
        match local_by_hash.get(record.content_hash.as_str()) {
            Some(local_name) if *local_name != record.name => {
                diff.renamed.push(RenameEntry {
                    rename_from: record.name.clone(),
                    rename_to: (*local_name).to_string(),
                    content_hash: record.content_hash.clone(),
                });
            }
            Some(_) => {}
            None => diff.remote_only.push(entry(record)),
        }
    }

    for record in local {
        if !remote_by_hash.contains_key(record.content_hash.as_str()) {
            diff.local_only.push(entry(record));
        }
    }

    diff
}

fn index_by_hash(records: &[FileRecord]) -> HashMap<&str, &str> {
    records
        .iter()
        .map(|r| (r.content_hash.as_str(), r.name.as_str()))
        .collect()
}

fn entry(record: &FileRecord) -> FileEntry {
    FileEntry {
        name: record.name.clone(),
        content_hash: record.content_hash.clone(),
    }
}
