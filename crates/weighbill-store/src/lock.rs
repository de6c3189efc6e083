//! Cross-process writer lock.
//!
//! A lock is an exclusive advisory lock on a file in the ledger directory.
//! The operating system drops it when the holder exits, so a crashed writer
//! never leaves the ledger locked. A second writer fails fast with
//! `StoreUnavailable` instead of waiting.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, StoreError};

/// Default lock file name inside a ledger directory.
pub const DEFAULT_LOCK_FILE: &str = ".weighbill.lock";

/// Guard for an acquired writer lock; releases on drop.
#[derive(Debug)]
pub struct WriteLock {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl WriteLock {
    /// Take the lock on the file at `path`, creating the file if needed.
    ///
    /// A leftover file from a writer that has exited does not block.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if another writer holds it or it cannot be opened.
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::unavailable(path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(StoreError::unavailable(
                    path,
                    "ledger is locked by another writer",
                ));
            }
            return Err(StoreError::unavailable(path, e));
        }

        // Owner pid is informational only.
        let written = file
            .set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()));
        if let Err(e) = written {
            tracing::debug!(path = %path.display(), error = %e, "Failed to record lock owner");
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            file: Some(file),
        })
    }

    /// A guard that holds nothing, for stores without a filesystem.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    /// Path of the held lock file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(
                    path = ?self.path,
                    error = %e,
                    "Failed to release ledger lock"
                );
            }
        }
    }
}
