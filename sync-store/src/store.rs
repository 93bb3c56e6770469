//! Flat-directory file store.
//!
//! Every write lands in a hidden temp file inside the target directory and
//! is renamed into place, so a concurrent reader sees either the old file
//! or the complete new one. Names are validated as flat file names before
//! any path is built from them.

use std::path::{Path, PathBuf};

use sync_types::{ContentBlob, DiffResult, FileRecord, SessionToken, DIFF_MANIFEST_FILE};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::metadata;

/// Prefix of in-flight temp files. Snapshots skip these.
pub const TEMP_PREFIX: &str = ".dirsync-tmp-";

/// Check that `name` is a single path component safe to join onto the root.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name == "." || name == ".." {
        "parent directory reference"
    } else if name.contains('/') || name.contains('\\') {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains a NUL byte"
    } else if name.starts_with(TEMP_PREFIX) {
        "reserved temp file prefix"
    } else {
        return Ok(());
    };
    Err(StorageError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Outcome of a best-effort batch write.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Names as stored on disk (prefixed when unique prefixing is on).
    pub written: Vec<String>,
    /// Declared names that could not be written, with the cause.
    pub failed: Vec<(String, StorageError)>,
}

impl WriteReport {
    /// True when every blob was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A directory of flat files addressed by name.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    unique_prefix: bool,
}

impl FileStore {
    /// Store rooted at `root`. The directory is not created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            unique_prefix: false,
        }
    }

    /// Prefix every batch-written file with a per-batch token.
    pub fn with_unique_prefix(mut self, enabled: bool) -> Self {
        self.unique_prefix = enabled;
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it is missing.
    pub async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))
    }

    /// Full path of a validated name.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Snapshot the directory; missing directory yields an empty list.
    pub async fn snapshot(&self) -> Vec<FileRecord> {
        metadata::generate(&self.root).await
    }

    /// Read a file's bytes.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_of(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// Read a file and wrap it as a blob.
    pub async fn read_blob(&self, name: &str) -> Result<ContentBlob, StorageError> {
        let bytes = self.read(name).await?;
        Ok(ContentBlob::encode(name, &bytes))
    }

    /// Read every readable file among `names`; unreadable ones are logged
    /// and skipped.
    pub async fn read_blobs<S: AsRef<str>>(&self, names: &[S]) -> Vec<ContentBlob> {
        let mut blobs = Vec::with_capacity(names.len());
        for name in names {
            match self.read_blob(name.as_ref()).await {
                Ok(blob) => blobs.push(blob),
                Err(e) => warn!(name = name.as_ref(), error = %e, "Skipping unreadable file"),
            }
        }
        blobs
    }

    /// Atomically write `bytes` under `name`.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let target = self.path_of(name)?;
        // Fixed-length temp name so any name the filesystem accepts can be staged
        let temp = self
            .root
            .join(format!("{}{}", TEMP_PREFIX, uuid::Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&temp, bytes).await {
            return Err(StorageError::io(temp, e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(target, e));
        }
        debug!(name, bytes = bytes.len(), "File written");
        Ok(target)
    }

    /// Decode a blob and write it, optionally under a token prefix.
    ///
    /// Returns the stored name.
    pub async fn write_blob(
        &self,
        blob: &ContentBlob,
        token: Option<&SessionToken>,
    ) -> Result<String, StorageError> {
        validate_name(&blob.name)?;
        let bytes = blob.decode()?;
        let stored = match token {
            Some(token) => token.prefix(&blob.name),
            None => blob.name.clone(),
        };
        self.write(&stored, &bytes).await?;
        Ok(stored)
    }

    /// Write every blob, best effort.
    ///
    /// A failure is recorded and the rest still get written; nothing
    /// already written is rolled back. With unique prefixing on, the whole
    /// batch shares one fresh token.
    pub async fn write_all(&self, blobs: &[ContentBlob]) -> WriteReport {
        let token = self.unique_prefix.then(SessionToken::new);
        let mut report = WriteReport::default();
        for blob in blobs {
            match self.write_blob(blob, token.as_ref()).await {
                Ok(stored) => report.written.push(stored),
                Err(e) => {
                    warn!(name = %blob.name, error = %e, "Failed to write file");
                    report.failed.push((blob.name.clone(), e));
                }
            }
        }
        report
    }

    /// Persist a diff manifest as `differences.json`.
    pub async fn write_manifest(&self, diff: &DiffResult) -> Result<PathBuf, StorageError> {
        let json = diff.to_json()?;
        self.write(DIFF_MANIFEST_FILE, &json).await
    }

    /// Delete a file. Returns `Ok(false)` if it did not exist.
    pub async fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}
