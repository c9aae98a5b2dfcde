// src/ledger/mod.rs

//! Persistence layer for the installation ledger
//!
//! This module handles everything that touches the ledger document:
//! - Loading with schema-version checks
//! - Atomic saves (temp file in the same directory, fsync, rename)
//! - Timestamped backups and restores
//! - The advisory session lock
//!
//! Storage sits behind the [`LedgerStore`] trait so the tracker can run
//! against a real file ([`FileStore`]) or purely in memory ([`MemoryStore`]).

pub mod lock;
pub mod models;
pub mod paths;
pub mod schema;

pub use lock::LedgerLock;
pub use models::{
    DependencyRecord, InstallMethod, InstallationRecord, InstallationStats, Ledger,
    RemovalSafety,
};

use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Backing storage for a ledger document
pub trait LedgerStore {
    /// Load the ledger, creating and persisting an empty one if none exists
    fn load(&mut self) -> Result<Ledger>;

    /// Persist the ledger, bumping its `updated_at`
    fn save(&mut self, ledger: &mut Ledger) -> Result<()>;

    /// Copy the live ledger into a timestamped backup and return its name
    fn backup(&mut self, suffix: Option<&str>) -> Result<String>;

    /// Replace the live ledger with a backup
    ///
    /// The backup is validated first and the current live ledger is backed up
    /// with the `pre-restore` suffix before anything is overwritten.
    fn restore_backup(&mut self, name: &str) -> Result<Ledger>;

    /// Names of all backups, in no particular order
    fn list_backups(&self) -> Result<Vec<String>>;

    /// Take the session lock, if this store supports one
    fn lock(&self) -> Result<Option<LedgerLock>>;
}

/// Suffix used for the automatic backup taken before a restore
pub const PRE_RESTORE_SUFFIX: &str = "pre-restore";

/// Ledger stored as a JSON file on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store backed by an explicit ledger file path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store for `manifest.json` inside a toolshed home directory
    pub fn in_home(home: &Path) -> Self {
        Self::new(paths::manifest_path(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups_dir(&self) -> PathBuf {
        paths::backups_dir(&self.path)
    }

    fn next_backup_path(&self, suffix: Option<&str>) -> PathBuf {
        let dir = self.backups_dir();
        let base = paths::backup_file_name(Utc::now(), suffix);
        let mut candidate = dir.join(&base);
        let mut counter = 1;
        while candidate.exists() {
            let stem = base.trim_end_matches(".json");
            candidate = dir.join(format!("{}-{}.json", stem, counter));
            counter += 1;
        }
        candidate
    }
}

impl LedgerStore for FileStore {
    fn load(&mut self) -> Result<Ledger> {
        if !self.path.exists() {
            info!("No ledger at {}, creating an empty one", self.path.display());
            let mut ledger = Ledger::new();
            self.save(&mut ledger)?;
            return Ok(ledger);
        }

        let raw = fs::read_to_string(&self.path)?;
        schema::parse_ledger(&raw, &self.path)
    }

    fn save(&mut self, ledger: &mut Ledger) -> Result<()> {
        ledger.touch();
        let payload = serde_json::to_vec_pretty(ledger)?;
        write_atomic(&self.path, &payload)?;
        debug!("Saved ledger to {}", self.path.display());
        Ok(())
    }

    fn backup(&mut self, suffix: Option<&str>) -> Result<String> {
        let contents = fs::read(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no ledger at {} to back up", self.path.display()),
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let backup_path = self.next_backup_path(suffix);
        write_atomic(&backup_path, &contents)?;

        let name = backup_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Backed up ledger to {}", backup_path.display());
        Ok(name)
    }

    fn restore_backup(&mut self, name: &str) -> Result<Ledger> {
        if !paths::is_plain_file_name(name) {
            return Err(Error::BackupNotFound(name.to_string()));
        }

        let backup_path = self.backups_dir().join(name);
        if !backup_path.is_file() {
            return Err(Error::BackupNotFound(name.to_string()));
        }

        let raw = fs::read_to_string(&backup_path)?;
        let ledger = schema::parse_ledger(&raw, &backup_path)?;

        if self.path.exists() {
            let snapshot = self.backup(Some(PRE_RESTORE_SUFFIX))?;
            debug!("Current ledger saved as {} before restore", snapshot);
        }

        write_atomic(&self.path, raw.as_bytes())?;
        info!("Restored ledger from backup {}", name);
        Ok(ledger)
    }

    fn list_backups(&self) -> Result<Vec<String>> {
        let dir = self.backups_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn lock(&self) -> Result<Option<LedgerLock>> {
        LedgerLock::acquire(paths::lock_path(&self.path)).map(Some)
    }
}

/// Write `contents` to `path` so readers see either the old or the new file
///
/// The bytes go to a temp file in the destination directory, which is synced
/// and then renamed over the destination.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = paths::ledger_dir(path);
    fs::create_dir_all(&dir).map_err(|e| {
        Error::InitError(format!("Failed to create directory {}: {}", dir.display(), e))
    })?;

    let atomic_err = |message: String| Error::AtomicWrite {
        path: path.to_path_buf(),
        message,
    };

    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| atomic_err(e.to_string()))?;
    temp.write_all(contents).map_err(|e| atomic_err(e.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| atomic_err(e.to_string()))?;
    temp.persist(path)
        .map_err(|e| atomic_err(e.error.to_string()))?;

    Ok(())
}

/// Ledger kept in memory as serialized JSON
///
/// Documents go through the same serde and schema checks as [`FileStore`],
/// so round-trip behavior matches the on-disk store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
    backups: HashMap<String, String>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing raw document
    pub fn with_document(raw: impl Into<String>) -> Self {
        Self {
            document: Some(raw.into()),
            ..Self::default()
        }
    }

    /// The current serialized ledger, if any
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// How many times `save` has succeeded
    pub fn save_count(&self) -> usize {
        self.saves
    }

    fn source() -> &'static Path {
        Path::new("<memory>")
    }
}

impl LedgerStore for MemoryStore {
    fn load(&mut self) -> Result<Ledger> {
        match &self.document {
            Some(raw) => schema::parse_ledger(raw, Self::source()),
            None => {
                let mut ledger = Ledger::new();
                self.save(&mut ledger)?;
                Ok(ledger)
            }
        }
    }

    fn save(&mut self, ledger: &mut Ledger) -> Result<()> {
        ledger.touch();
        self.document = Some(serde_json::to_string_pretty(ledger)?);
        self.saves += 1;
        Ok(())
    }

    fn backup(&mut self, suffix: Option<&str>) -> Result<String> {
        let document = self.document.clone().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no ledger in memory to back up",
            ))
        })?;

        let base = paths::backup_file_name(Utc::now(), suffix);
        let mut name = base.clone();
        let mut counter = 1;
        while self.backups.contains_key(&name) {
            name = format!("{}-{}.json", base.trim_end_matches(".json"), counter);
            counter += 1;
        }

        self.backups.insert(name.clone(), document);
        Ok(name)
    }

    fn restore_backup(&mut self, name: &str) -> Result<Ledger> {
        let raw = self
            .backups
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BackupNotFound(name.to_string()))?;
        let ledger = schema::parse_ledger(&raw, Self::source())?;

        if self.document.is_some() {
            self.backup(Some(PRE_RESTORE_SUFFIX))?;
        }
        self.document = Some(raw);
        Ok(ledger)
    }

    fn list_backups(&self) -> Result<Vec<String>> {
        Ok(self.backups.keys().cloned().collect())
    }

    fn lock(&self) -> Result<Option<LedgerLock>> {
        Ok(None)
    }
}
