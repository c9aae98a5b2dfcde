// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for Toolshed
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors outside of ledger loading
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The ledger file exists but could not be parsed
    #[error("Ledger at {path} is corrupt: {message}")]
    LedgerCorrupt { path: PathBuf, message: String },

    /// The ledger carries a schema version this build does not understand
    #[error("Unsupported ledger schema version '{found}' (expected '{expected}')")]
    UnsupportedSchemaVersion { found: String, expected: String },

    /// The temp-file-and-rename write did not complete
    #[error("Failed to write {path} atomically: {message}")]
    AtomicWrite { path: PathBuf, message: String },

    /// No backup with the given name exists
    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    /// Another process holds the ledger lock
    #[error("Ledger lock unavailable at {path}: {message}")]
    LockUnavailable { path: PathBuf, message: String },

    /// Ledger location could not be resolved or prepared
    #[error("Failed to initialize ledger: {0}")]
    InitError(String),

    /// The name already has an installation record
    #[error("'{0}' is already tracked")]
    AlreadyTracked(String),

    /// The name has no installation record
    #[error("'{0}' is not tracked")]
    NotTracked(String),

    /// A dependency record still has dependents
    #[error("Dependency '{name}' is still used by: {}", dependents.join(", "))]
    DependencyInUse { name: String, dependents: Vec<String> },

    /// The catalog has no bundle with the given name
    #[error("Bundle not found: {0}")]
    BundleNotFound(String),

    /// Bundle inclusion loops back onto itself
    #[error("Circular dependency detected in bundle '{bundle}': {}", path.join(" -> "))]
    CircularBundle { bundle: String, path: Vec<String> },

    /// The catalog document could not be parsed
    #[error("Failed to parse catalog: {0}")]
    CatalogParse(String),
}

/// Result type alias using Toolshed's Error type
pub type Result<T> = std::result::Result<T, Error>;
