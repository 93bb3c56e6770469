//! Directory snapshots.
//!
//! A snapshot lists every regular file directly inside a directory with
//! its content hash. Subdirectories are not descended into. The manifest
//! files the protocol itself produces and in-flight temp files are left
//! out so they never take part in a comparison.

use std::path::Path;

use sync_types::{FileRecord, DIFF_MANIFEST_FILE, METADATA_FILE};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::hash::hash_file;
use crate::store::TEMP_PREFIX;

/// Whether `name` is excluded from snapshots.
///
/// Manifest names match case-insensitively.
pub fn is_excluded(name: &str) -> bool {
    name.eq_ignore_ascii_case(METADATA_FILE)
        || name.eq_ignore_ascii_case(DIFF_MANIFEST_FILE)
        || name.starts_with(TEMP_PREFIX)
}

/// Snapshot `dir`, failing if it does not exist.
///
/// Only the directory itself being unreadable is an error; a file that
/// disappears or cannot be hashed is left out. Output is sorted by name.
pub async fn try_generate(dir: &Path) -> Result<Vec<FileRecord>, StorageError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::DirectoryNotFound {
                path: dir.to_path_buf(),
            })
        }
        Err(e) => return Err(StorageError::io(dir, e)),
    };

    let mut records = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Directory listing interrupted");
                break;
            }
        };
        let path = entry.path();

        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file");
                continue;
            }
        };
        if !file_type.is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };
        if is_excluded(&name) {
            continue;
        }

        // Files may vanish between listing and hashing
        match hash_file(&path).await {
            Ok(content_hash) => records.push(FileRecord::new(name, content_hash)),
            Err(StorageError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(name = %name, "File removed during snapshot");
            }
            Err(e) => warn!(name = %name, error = %e, "Skipping unreadable file"),
        }
    }

    records.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(dir = %dir.display(), files = records.len(), "Directory snapshot generated");
    Ok(records)
}

/// Snapshot `dir`; a missing or unreadable directory yields an empty list.
pub async fn generate(dir: &Path) -> Vec<FileRecord> {
    match try_generate(dir).await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "Directory snapshot failed, treating as empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    async fn write(dir: &Path, name: &str, data: &[u8]) {
        tokio::fs::write(dir.join(name), data).await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_lists_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.txt", b"bee").await;
        write(dir.path(), "a.txt", b"ay").await;

        let records = try_generate(dir.path()).await.unwrap();
        assert_eq!(
            records,
            vec![
                FileRecord::new("a.txt", hash_bytes(b"ay")),
                FileRecord::new("b.txt", hash_bytes(b"bee")),
            ]
        );
    }

    #[tokio::test]
    async fn manifests_and_temp_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.txt", b"x").await;
        write(dir.path(), "metadata.json", b"[]").await;
        write(dir.path(), "Metadata.JSON", b"[]").await;
        write(dir.path(), "differences.json", b"{}").await;
        write(dir.path(), ".dirsync-tmp-abc-keep.txt", b"partial").await;

        let records = try_generate(dir.path()).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["keep.txt"]);
    }

    #[tokio::test]
    async fn subdirectories_ignored() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("nested")).await.unwrap();
        write(&dir.path().join("nested"), "inner.txt", b"x").await;

        assert!(try_generate(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        assert!(matches!(
            try_generate(&missing).await,
            Err(StorageError::DirectoryNotFound { .. })
        ));
        assert!(generate(&missing).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn vanishing_files_do_not_fail_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stable.txt", b"stays").await;

        let root = dir.path().to_path_buf();
        let churn = tokio::spawn(async move {
            for i in 0..500 {
                let path = root.join(format!("churn{i}.txt"));
                tokio::fs::write(&path, b"x").await.unwrap();
                tokio::fs::remove_file(&path).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let mut snapshots = 0;
        while !churn.is_finished() || snapshots == 0 {
            snapshots += 1;
            let records = try_generate(dir.path()).await.unwrap();
            assert!(records.iter().any(|r| r.name == "stable.txt"));
        }
        churn.await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_file_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.txt", b"ok").await;
        let locked = dir.path().join("locked.txt");
        write(dir.path(), "locked.txt", b"secret").await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits, so only assert the readable file
        let records = try_generate(dir.path()).await.unwrap();
        assert!(records.iter().any(|r| r.name == "ok.txt"));
    }

    #[tokio::test]
    async fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(generate(dir.path()).await.is_empty());
    }

    #[test]
    fn exclusion_rules() {
        assert!(is_excluded("METADATA.json"));
        assert!(is_excluded("Differences.Json"));
        assert!(!is_excluded("metadata.json.bak"));
        assert!(!is_excluded("notes.txt"));
    }
}
