// src/ledger/paths.rs
//! Centralized path derivation for the toolshed home directory

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default home directory
pub const HOME_ENV: &str = "TOOLSHED_HOME";

/// Directory name under the user's home directory
pub const DEFAULT_DIR_NAME: &str = ".toolshed";

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CATALOG_FILE: &str = "catalog.toml";

/// Resolve the toolshed home: `TOOLSHED_HOME`, then `~/.toolshed`
pub fn default_home() -> Result<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => dirs::home_dir()
            .map(|home| home.join(DEFAULT_DIR_NAME))
            .ok_or_else(|| Error::InitError("Could not determine home directory".to_string())),
    }
}

/// Resolve the home directory, preferring an explicit override
pub fn resolve_home(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir.to_path_buf()),
        None => default_home(),
    }
}

/// Get the live ledger path inside a home directory
pub fn manifest_path(home: &Path) -> PathBuf {
    home.join(MANIFEST_FILE)
}

/// Get the default catalog path inside a home directory
pub fn catalog_path(home: &Path) -> PathBuf {
    home.join(CATALOG_FILE)
}

/// Get the directory holding the ledger file
pub fn ledger_dir(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf()
}

/// Get the backups directory next to the ledger file
pub fn backups_dir(manifest_path: &Path) -> PathBuf {
    ledger_dir(manifest_path).join("backups")
}

/// Get the advisory lock file for a ledger
pub fn lock_path(manifest_path: &Path) -> PathBuf {
    manifest_path.with_extension("lock")
}

/// Build a backup file name: `manifest-<YYYYmmdd>T<HHMMSS><millis>[-suffix].json`
pub fn backup_file_name(timestamp: DateTime<Utc>, suffix: Option<&str>) -> String {
    let stamp = timestamp.format("%Y%m%dT%H%M%S%3f");
    match suffix.map(sanitize_suffix).filter(|s| !s.is_empty()) {
        Some(suffix) => format!("manifest-{}-{}.json", stamp, suffix),
        None => format!("manifest-{}.json", stamp),
    }
}

fn sanitize_suffix(suffix: &str) -> String {
    suffix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Whether a backup name is a plain file name (no separators or parent refs)
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
