//! Single-instance lock.
//!
//! An exclusive advisory lock on a file, held for the lifetime of the
//! server. A second server pointed at the same lock file fails to start.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, ServerError};

/// Held exclusive lock. Released when dropped.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    _file: File,
}

impl InstanceLock {
    /// Try to take the lock without blocking.
    ///
    /// Fails with `AlreadyRunning` if another holder exists. Creates the
    /// lock file (and its parent directory) when missing.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(ServerError::AlreadyRunning {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(path = %path.display(), "Instance lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
