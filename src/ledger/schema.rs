// src/ledger/schema.rs

//! Ledger document versioning
//!
//! The `schema_version` tag is checked on the raw JSON value before the
//! document is deserialized into a [`Ledger`]. Unknown versions are rejected
//! outright; there is no silent migration path.

use crate::error::{Error, Result};
use crate::ledger::models::Ledger;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Current ledger schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Field holding the version tag
const VERSION_FIELD: &str = "schema_version";

/// Reject any version other than the current one
pub fn check_version(found: &str) -> Result<()> {
    if found == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(Error::UnsupportedSchemaVersion {
            found: found.to_string(),
            expected: SCHEMA_VERSION.to_string(),
        })
    }
}

/// Parse a raw ledger document read from `source`
///
/// # Arguments
///
/// * `raw` - The document text
/// * `source` - Where it came from, for error messages
///
/// # Returns
///
/// * `Result<Ledger>` - `LedgerCorrupt` for malformed JSON or a missing tag,
///   `UnsupportedSchemaVersion` for a tag this build does not know
pub fn parse_ledger(raw: &str, source: &Path) -> Result<Ledger> {
    let value: Value = serde_json::from_str(raw).map_err(|e| corrupt(source, e.to_string()))?;

    let version = match value.get(VERSION_FIELD) {
        Some(Value::String(version)) => version.as_str(),
        Some(other) => {
            return Err(corrupt(
                source,
                format!("{} must be a string, found {}", VERSION_FIELD, other),
            ));
        }
        None => return Err(corrupt(source, format!("missing {}", VERSION_FIELD))),
    };
    check_version(version)?;

    let ledger: Ledger =
        serde_json::from_value(value).map_err(|e| corrupt(source, e.to_string()))?;

    for (dependency, dependent) in ledger.dangling_dependents() {
        warn!(
            "Dependency '{}' lists '{}' as a dependent, but it is not tracked",
            dependency, dependent
        );
    }

    debug!(
        "Parsed ledger from {}: {} installations, {} dependencies",
        source.display(),
        ledger.installations.len(),
        ledger.dependencies.len()
    );

    Ok(ledger)
}

fn corrupt(source: &Path, message: String) -> Error {
    Error::LedgerCorrupt {
        path: source.to_path_buf(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{InstallMethod, InstallationRecord};

    #[test]
    fn test_check_version() {
        assert!(check_version("1.0").is_ok());
        assert!(matches!(
            check_version("2.0"),
            Err(Error::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_parse_round_trip() {
        let mut ledger = Ledger::new();
        let mut record = InstallationRecord::new(InstallMethod::Cargo);
        record.version = "14.1.0".to_string();
        record.dependencies = vec!["rust".to_string()];
        ledger.installations.insert("ripgrep".to_string(), record);

        let raw = serde_json::to_string_pretty(&ledger).unwrap();
        let parsed = parse_ledger(&raw, Path::new("manifest.json")).unwrap();
        assert_eq!(parsed, ledger);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let raw = r#"{"schema_version": "9.9", "installations": "not even a map"}"#;
        let err = parse_ledger(raw, Path::new("manifest.json")).unwrap_err();
        match err {
            Error::UnsupportedSchemaVersion { found, expected } => {
                assert_eq!(found, "9.9");
                assert_eq!(expected, SCHEMA_VERSION);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_tag_is_corrupt() {
        let raw = r#"{"installations": {}, "dependencies": {}}"#;
        assert!(matches!(
            parse_ledger(raw, Path::new("manifest.json")),
            Err(Error::LedgerCorrupt { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_corrupt() {
        assert!(matches!(
            parse_ledger("{ not json", Path::new("manifest.json")),
            Err(Error::LedgerCorrupt { .. })
        ));
        assert!(matches!(
            parse_ledger(r#"{"schema_version": 1}"#, Path::new("manifest.json")),
            Err(Error::LedgerCorrupt { .. })
        ));
    }

    #[test]
    fn test_absent_optional_fields_default() {
        let raw = r#"{
            "schema_version": "1.0",
            "installations": {
                "fd": { "method": "cargo", "installed_at": "2024-01-01T00:00:00Z" }
            },
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }"#;
        let ledger = parse_ledger(raw, Path::new("manifest.json")).unwrap();
        let fd = ledger.get("fd").unwrap();
        assert_eq!(fd.method, InstallMethod::Cargo);
        assert!(fd.dependencies.is_empty());
        assert!(!fd.user_requested);
        assert!(ledger.dependencies.is_empty());
    }
}
