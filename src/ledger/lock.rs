// src/ledger/lock.rs

//! Advisory exclusive lock around a ledger session
//!
//! The tracker holds this lock from load to drop, so two processes can never
//! interleave their load-modify-save cycles on the same ledger file. The lock
//! is `flock`-based and released automatically when the file handle closes.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts before giving up: waits of 100ms, 200ms, 400ms, 800ms in between
const MAX_RETRIES: u32 = 5;

/// Held advisory lock on `<manifest>.lock`
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Acquire the lock, retrying with exponential backoff
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    debug!("Ledger lock busy at {} (attempt {})", path.display(), attempt + 1);
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        std::thread::sleep(Duration::from_millis(100 * (1 << attempt)));
                    }
                }
            }
        }

        if let Some(e) = last_error {
            return Err(Error::LockUnavailable {
                path,
                message: format!(
                    "gave up after {} attempts; another toolshed process may be running ({})",
                    MAX_RETRIES, e
                ),
            });
        }

        debug!("Acquired ledger lock at {}", path.display());
        Ok(Self { file, path })
    }

    /// Try once without waiting; `Ok(None)` when someone else holds it
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(Error::LockUnavailable {
                path,
                message: e.to_string(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release ledger lock at {}: {}", self.path.display(), e);
        } else {
            debug!("Released ledger lock at {}", self.path.display());
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| Error::LockUnavailable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
