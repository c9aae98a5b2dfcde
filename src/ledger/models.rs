// src/ledger/models.rs

//! Data model for the installation ledger
//!
//! The ledger is a single document holding two string-keyed maps: one
//! installation record per tracked tool or bundle, and one dependency record
//! per shared toolchain/runtime. Dependency edges are plain name lists in both
//! directions (an installation's `dependencies`, a dependency's `dependents`).

use crate::error::{Error, Result};
use crate::ledger::schema::SCHEMA_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Ledger key prefix that marks an installation record as a bundle
pub const BUNDLE_PREFIX: &str = "bundle:";

/// Context tag carried by every pre-existing record
pub const PRE_EXISTING_CONTEXT: &str = "pre-existing";

/// Installer identity for dependency records created implicitly by a tool
pub const IMPLICIT_INSTALLER: &str = "implicit";

/// Ledger key for a bundle name (idempotent on already-prefixed names)
pub fn bundle_key(name: &str) -> String {
    if is_bundle_key(name) {
        name.to_string()
    } else {
        format!("{}{}", BUNDLE_PREFIX, name)
    }
}

/// Whether a ledger key names a bundle record
pub fn is_bundle_key(name: &str) -> bool {
    name.starts_with(BUNDLE_PREFIX)
}

/// Bundle name without the ledger prefix
pub fn bundle_name(key: &str) -> &str {
    key.strip_prefix(BUNDLE_PREFIX).unwrap_or(key)
}

/// How a tracked tool or bundle got onto the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMethod {
    /// Cloned and built from source
    SourceBuild,
    /// `cargo install`
    Cargo,
    /// `pip install`
    Pip,
    /// `npm install -g`
    Npm,
    /// `go install`
    Go,
    /// `gem install`
    Gem,
    /// Installed through the system package manager
    SystemPackage,
    /// Prebuilt binary downloaded and unpacked
    ManualDownload,
    /// A bundle record; owns no files itself
    Bundle,
    /// Found on the system before toolshed was involved
    PreExisting,
}

impl InstallMethod {
    pub fn as_str(&self) -> &str {
        match self {
            InstallMethod::SourceBuild => "source_build",
            InstallMethod::Cargo => "cargo",
            InstallMethod::Pip => "pip",
            InstallMethod::Npm => "npm",
            InstallMethod::Go => "go",
            InstallMethod::Gem => "gem",
            InstallMethod::SystemPackage => "system_package",
            InstallMethod::ManualDownload => "manual_download",
            InstallMethod::Bundle => "bundle",
            InstallMethod::PreExisting => "pre_existing",
        }
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "source_build" | "source" => Ok(InstallMethod::SourceBuild),
            "cargo" => Ok(InstallMethod::Cargo),
            "pip" => Ok(InstallMethod::Pip),
            "npm" => Ok(InstallMethod::Npm),
            "go" => Ok(InstallMethod::Go),
            "gem" => Ok(InstallMethod::Gem),
            "system_package" | "system" => Ok(InstallMethod::SystemPackage),
            "manual_download" | "download" => Ok(InstallMethod::ManualDownload),
            "bundle" => Ok(InstallMethod::Bundle),
            "pre_existing" => Ok(InstallMethod::PreExisting),
            _ => Err(format!("Invalid install method: {}", s)),
        }
    }
}

/// One tracked tool or bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub method: InstallMethod,
    #[serde(default)]
    pub version: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub binary_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repo: Option<String>,
    /// Shared dependencies for tools, member tools for bundles
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_by_bundle: Option<String>,
    #[serde(default)]
    pub user_requested: bool,
    #[serde(default)]
    pub installation_context: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_packages: Vec<String>,
}

impl InstallationRecord {
    /// Create a record stamped with the current time
    pub fn new(method: InstallMethod) -> Self {
        Self {
            method,
            version: String::new(),
            installed_at: Utc::now(),
            binary_paths: Vec::new(),
            build_dir: None,
            source_repo: None,
            dependencies: Vec::new(),
            installed_by_bundle: None,
            user_requested: false,
            installation_context: Vec::new(),
            config_files: Vec::new(),
            system_packages: Vec::new(),
        }
    }

    /// Pre-existing either by method or by context tag; never removable
    pub fn is_pre_existing(&self) -> bool {
        self.method == InstallMethod::PreExisting
            || self
                .installation_context
                .iter()
                .any(|tag| tag == PRE_EXISTING_CONTEXT)
    }

    pub fn is_bundle(&self) -> bool {
        self.method == InstallMethod::Bundle
    }

    /// Append a context tag unless already present
    pub fn add_context(&mut self, tag: &str) -> bool {
        if self.installation_context.iter().any(|t| t == tag) {
            return false;
        }
        self.installation_context.push(tag.to_string());
        true
    }
}

/// One shared toolchain or runtime and the tools that use it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub installer: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub pre_existing: bool,
    #[serde(default)]
    pub dependents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    pub installed_at: DateTime<Utc>,
}

impl DependencyRecord {
    pub fn new(installer: impl Into<String>) -> Self {
        Self {
            installer: installer.into(),
            version: String::new(),
            pre_existing: false,
            dependents: Vec::new(),
            install_path: None,
            installed_at: Utc::now(),
        }
    }

    /// Add a dependent exactly once; returns false if it was already listed
    pub fn add_dependent(&mut self, name: &str) -> bool {
        if self.dependents.iter().any(|d| d == name) {
            return false;
        }
        self.dependents.push(name.to_string());
        true
    }

    /// Drop a dependent; returns false if it was not listed
    pub fn remove_dependent(&mut self, name: &str) -> bool {
        let before = self.dependents.len();
        self.dependents.retain(|d| d != name);
        before != self.dependents.len()
    }

    /// No dependents left
    pub fn is_cleanup_eligible(&self) -> bool {
        self.dependents.is_empty()
    }
}

/// Result of asking whether an installation can be removed without breaking anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalSafety {
    Safe,
    PreExisting,
    /// Other installations list this name as a dependency
    Blocked(Vec<String>),
}

impl RemovalSafety {
    pub fn is_safe(&self) -> bool {
        matches!(self, RemovalSafety::Safe)
    }

    /// Human-readable reasons; empty when safe
    pub fn reasons(&self) -> Vec<String> {
        match self {
            RemovalSafety::Safe => Vec::new(),
            RemovalSafety::PreExisting => vec![PRE_EXISTING_CONTEXT.to_string()],
            RemovalSafety::Blocked(blockers) => blockers
                .iter()
                .map(|b| format!("required by {}", b))
                .collect(),
        }
    }

    pub fn blockers(&self) -> &[String] {
        match self {
            RemovalSafety::Blocked(blockers) => blockers,
            _ => &[],
        }
    }
}

/// Counts over the tracked installations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallationStats {
    pub total: usize,
    pub tools: usize,
    pub bundles: usize,
    pub user_requested: usize,
    pub dependencies: usize,
    pub cleanup_eligible: usize,
    pub by_method: BTreeMap<String, usize>,
}

/// The persisted aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub schema_version: String,
    #[serde(default)]
    pub installations: BTreeMap<String, InstallationRecord>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger at the current schema version
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            installations: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installations.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&InstallationRecord> {
        self.installations.get(name)
    }

    /// Fetch a record that must exist
    pub fn require(&self, name: &str) -> Result<&InstallationRecord> {
        self.installations
            .get(name)
            .ok_or_else(|| Error::NotTracked(name.to_string()))
    }

    /// Dependents recorded on the dependency record, or empty
    pub fn recorded_dependents(&self, dependency: &str) -> Vec<String> {
        self.dependencies
            .get(dependency)
            .map(|record| record.dependents.clone())
            .unwrap_or_default()
    }

    /// Every installation that uses `dependency`, from either edge direction
    ///
    /// Sorted and deduplicated. Bundle records are skipped: their
    /// `dependencies` are member tools, not shared toolchains.
    pub fn users_of(&self, dependency: &str) -> Vec<String> {
        let mut users: BTreeSet<String> = self
            .recorded_dependents(dependency)
            .into_iter()
            .filter(|name| self.is_installed(name))
            .collect();
        for (name, record) in &self.installations {
            if record.is_bundle() {
                continue;
            }
            if record.dependencies.iter().any(|d| d == dependency) {
                users.insert(name.clone());
            }
        }
        users.into_iter().collect()
    }

    /// Other installations that list `name` in their dependency list
    pub fn blockers_of(&self, name: &str) -> Vec<String> {
        self.installations
            .iter()
            .filter(|(other, _)| other.as_str() != name)
            .filter(|(_, record)| record.dependencies.iter().any(|d| d == name))
            .map(|(other, _)| other.clone())
            .collect()
    }

    /// Decide whether `name` can be removed without breaking another installation
    pub fn check_removal(&self, name: &str) -> Result<RemovalSafety> {
        let record = self.require(name)?;
        if record.is_pre_existing() {
            return Ok(RemovalSafety::PreExisting);
        }

        let blockers = self.blockers_of(name);
        if blockers.is_empty() {
            Ok(RemovalSafety::Safe)
        } else {
            Ok(RemovalSafety::Blocked(blockers))
        }
    }

    /// Dependency records with no dependents left
    pub fn cleanup_candidates(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .filter(|(_, record)| record.is_cleanup_eligible())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Dependents that point at names with no installation record
    pub fn dangling_dependents(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();
        for (dependency, record) in &self.dependencies {
            for dependent in &record.dependents {
                if !self.is_installed(dependent) {
                    dangling.push((dependency.clone(), dependent.clone()));
                }
            }
        }
        dangling
    }

    pub fn stats(&self) -> InstallationStats {
        let mut stats = InstallationStats {
            total: self.installations.len(),
            dependencies: self.dependencies.len(),
            cleanup_eligible: self.cleanup_candidates().len(),
            ..Default::default()
        };

        for (name, record) in &self.installations {
            if is_bundle_key(name) {
                stats.bundles += 1;
            } else {
                stats.tools += 1;
            }
            if record.user_requested {
                stats.user_requested += 1;
            }
            *stats
                .by_method
                .entry(record.method.as_str().to_string())
                .or_insert(0) += 1;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(method: InstallMethod, deps: &[&str]) -> InstallationRecord {
        let mut record = InstallationRecord::new(method);
        record.dependencies = deps.iter().map(|d| d.to_string()).collect();
        record.user_requested = true;
        record
    }

    #[test]
    fn test_install_method_round_trip() {
        for method in [
            InstallMethod::SourceBuild,
            InstallMethod::Cargo,
            InstallMethod::Pip,
            InstallMethod::Npm,
            InstallMethod::Go,
            InstallMethod::Gem,
            InstallMethod::SystemPackage,
            InstallMethod::ManualDownload,
            InstallMethod::Bundle,
            InstallMethod::PreExisting,
        ] {
            assert_eq!(method.as_str().parse::<InstallMethod>().unwrap(), method);
        }
        assert!("brew-cask".parse::<InstallMethod>().is_err());
    }

    #[test]
    fn test_install_method_serializes_snake_case() {
        let json = serde_json::to_string(&InstallMethod::SourceBuild).unwrap();
        assert_eq!(json, "\"source_build\"");
    }

    #[test]
    fn test_bundle_key_helpers() {
        assert_eq!(bundle_key("rust-dev"), "bundle:rust-dev");
        assert_eq!(bundle_key("bundle:rust-dev"), "bundle:rust-dev");
        assert!(is_bundle_key("bundle:rust-dev"));
        assert!(!is_bundle_key("ripgrep"));
        assert_eq!(bundle_name("bundle:rust-dev"), "rust-dev");
        assert_eq!(bundle_name("ripgrep"), "ripgrep");
    }

    #[test]
    fn test_add_dependent_is_idempotent() {
        let mut record = DependencyRecord::new("rustup");
        assert!(record.add_dependent("ripgrep"));
        assert!(!record.add_dependent("ripgrep"));
        assert!(record.add_dependent("fd"));
        assert_eq!(record.dependents, vec!["ripgrep", "fd"]);

        assert!(record.remove_dependent("ripgrep"));
        assert!(!record.remove_dependent("ripgrep"));
        assert!(!record.is_cleanup_eligible());
        record.remove_dependent("fd");
        assert!(record.is_cleanup_eligible());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let record = InstallationRecord::new(InstallMethod::Cargo);
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("method"));
        assert!(object.contains_key("installed_at"));
        assert!(object.contains_key("binary_paths"));
        assert!(!object.contains_key("build_dir"));
        assert!(!object.contains_key("source_repo"));
        assert!(!object.contains_key("installed_by_bundle"));
        assert!(!object.contains_key("config_files"));
        assert!(!object.contains_key("system_packages"));
    }

    #[test]
    fn test_check_removal() {
        let mut ledger = Ledger::new();
        ledger
            .installations
            .insert("rust".to_string(), tool(InstallMethod::SourceBuild, &[]));
        ledger
            .installations
            .insert("ripgrep".to_string(), tool(InstallMethod::Cargo, &["rust"]));
        ledger.installations.insert(
            "git".to_string(),
            tool(InstallMethod::PreExisting, &[]),
        );

        assert_eq!(
            ledger.check_removal("rust").unwrap(),
            RemovalSafety::Blocked(vec!["ripgrep".to_string()])
        );
        assert!(ledger.check_removal("ripgrep").unwrap().is_safe());
        assert_eq!(
            ledger.check_removal("git").unwrap(),
            RemovalSafety::PreExisting
        );
        assert!(matches!(
            ledger.check_removal("missing"),
            Err(Error::NotTracked(_))
        ));
    }

    #[test]
    fn test_pre_existing_tag_is_honored() {
        let mut record = tool(InstallMethod::ManualDownload, &[]);
        assert!(!record.is_pre_existing());
        record.add_context(PRE_EXISTING_CONTEXT);
        assert!(record.is_pre_existing());
    }

    #[test]
    fn test_users_of_merges_both_directions() {
        let mut ledger = Ledger::new();
        ledger
            .installations
            .insert("ripgrep".to_string(), tool(InstallMethod::Cargo, &["rust"]));
        ledger
            .installations
            .insert("fd".to_string(), tool(InstallMethod::Cargo, &[]));
        let mut rust = DependencyRecord::new("rustup");
        rust.add_dependent("fd");
        rust.add_dependent("ghost");
        ledger.dependencies.insert("rust".to_string(), rust);

        // "ghost" has no installation record and is dropped
        assert_eq!(ledger.users_of("rust"), vec!["fd", "ripgrep"]);
        assert_eq!(
            ledger.dangling_dependents(),
            vec![("rust".to_string(), "ghost".to_string())]
        );
    }

    #[test]
    fn test_stats() {
        let mut ledger = Ledger::new();
        ledger
            .installations
            .insert("ripgrep".to_string(), tool(InstallMethod::Cargo, &["rust"]));
        ledger
            .installations
            .insert("fd".to_string(), tool(InstallMethod::Cargo, &["rust"]));
        let mut bundle = tool(InstallMethod::Bundle, &["ripgrep", "fd"]);
        bundle.user_requested = false;
        ledger
            .installations
            .insert("bundle:search".to_string(), bundle);
        ledger
            .dependencies
            .insert("node".to_string(), DependencyRecord::new("implicit"));

        let stats = ledger.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.tools, 2);
        assert_eq!(stats.bundles, 1);
        assert_eq!(stats.user_requested, 2);
        assert_eq!(stats.by_method.get("cargo"), Some(&2));
        assert_eq!(stats.by_method.get("bundle"), Some(&1));
        assert_eq!(stats.dependencies, 1);
        assert_eq!(stats.cleanup_eligible, 1);
    }
}
