// src/tracker/mod.rs

//! Installation tracker
//!
//! The tracker is the only writer of the ledger. It owns a [`LedgerStore`],
//! the loaded [`Ledger`], and (for file-backed stores) the advisory session
//! lock. Every mutation is applied to a copy of the ledger and persisted
//! before it replaces the in-memory state, so a failed save leaves both the
//! file and the tracker unchanged.

use crate::error::{Error, Result};
use crate::ledger::models::{
    DependencyRecord, IMPLICIT_INSTALLER, InstallMethod, InstallationRecord, InstallationStats,
    Ledger, PRE_EXISTING_CONTEXT, RemovalSafety, bundle_key, bundle_name,
};
use crate::ledger::{LedgerLock, LedgerStore};
use crate::removal::{DependencyFate, RemovalPlan};
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Context tag placed on every bundle record
pub const BUNDLE_CONTEXT: &str = "bundle";

/// Suffix of the snapshot taken before a plan is applied
pub const PRE_REMOVAL_SUFFIX: &str = "pre-removal";

/// Everything known about a tool at the moment it was installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    pub method: InstallMethod,
    pub version: String,
    pub binary_paths: Vec<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub source_repo: Option<String>,
    pub dependencies: Vec<String>,
    pub installed_by_bundle: Option<String>,
    pub user_requested: bool,
    pub installation_context: Vec<String>,
    pub config_files: Vec<PathBuf>,
    pub system_packages: Vec<String>,
}

impl InstallConfig {
    /// User-requested install with everything else empty
    pub fn new(method: InstallMethod) -> Self {
        Self {
            method,
            version: String::new(),
            binary_paths: Vec::new(),
            build_dir: None,
            source_repo: None,
            dependencies: Vec::new(),
            installed_by_bundle: None,
            user_requested: true,
            installation_context: Vec::new(),
            config_files: Vec::new(),
            system_packages: Vec::new(),
        }
    }

    fn into_record(self) -> InstallationRecord {
        let mut record = InstallationRecord::new(self.method);
        record.version = self.version;
        record.binary_paths = self.binary_paths;
        record.build_dir = self.build_dir;
        record.source_repo = self.source_repo;
        record.dependencies = dedup(self.dependencies);
        record.installed_by_bundle = self.installed_by_bundle;
        record.user_requested = self.user_requested;
        record.installation_context = dedup(self.installation_context);
        record.config_files = self.config_files;
        record.system_packages = self.system_packages;
        record
    }
}

/// Metadata for a shared dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConfig {
    pub installer: String,
    pub version: String,
    pub pre_existing: bool,
    pub install_path: Option<PathBuf>,
}

impl DependencyConfig {
    pub fn new(installer: &str) -> Self {
        Self {
            installer: installer.to_string(),
            version: String::new(),
            pre_existing: false,
            install_path: None,
        }
    }
}

/// A binary found on the search path that nothing has tracked yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreExistingTool {
    pub name: String,
    pub binary_path: PathBuf,
}

/// What `apply_removal` changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedRemoval {
    /// Backup taken before anything changed
    pub backup: String,
    pub untracked: Vec<String>,
    pub dropped_dependencies: Vec<String>,
}

pub struct Tracker<S: LedgerStore> {
    store: S,
    ledger: Ledger,
    _lock: Option<LedgerLock>,
}

impl<S: LedgerStore> Tracker<S> {
    /// Lock the store (if it supports locking) and load the ledger
    pub fn open(mut store: S) -> Result<Self> {
        let lock = store.lock()?;
        let ledger = store.load()?;
        debug!(
            "Tracker opened: {} installations, {} dependencies",
            ledger.installations.len(),
            ledger.dependencies.len()
        );
        Ok(Self {
            store,
            ledger,
            _lock: lock,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist `next` and, only on success, make it the current ledger
    fn commit(&mut self, mut next: Ledger) -> Result<()> {
        self.store.save(&mut next)?;
        self.ledger = next;
        Ok(())
    }

    /// Record a newly installed tool
    ///
    /// Each declared dependency gets a dependency record (created with the
    /// `implicit` installer if missing) listing `name` exactly once.
    ///
    /// # Errors
    ///
    /// * `AlreadyTracked` if `name` already has a record
    pub fn track_installation(&mut self, name: &str, config: InstallConfig) -> Result<()> {
        if self.ledger.is_installed(name) {
            return Err(Error::AlreadyTracked(name.to_string()));
        }

        let record = config.into_record();
        let method = record.method;
        let mut next = self.ledger.clone();
        for dependency in &record.dependencies {
            attach_dependent(&mut next, dependency, name);
        }
        next.installations.insert(name.to_string(), record);

        self.commit(next)?;
        info!("Tracked {} ({})", name, method);
        Ok(())
    }

    /// Record a bundle and claim its already-tracked members
    ///
    /// Members keep the first bundle that claimed them; every bundle adds a
    /// `bundle:<name>` context tag.
    pub fn track_bundle(
        &mut self,
        bundle: &str,
        tools: &[String],
        user_requested: bool,
    ) -> Result<()> {
        let key = bundle_key(bundle);
        let name = bundle_name(&key).to_string();
        if self.ledger.is_installed(&key) {
            return Err(Error::AlreadyTracked(key));
        }

        let mut record = InstallationRecord::new(InstallMethod::Bundle);
        record.dependencies = dedup(tools.to_vec());
        record.user_requested = user_requested;
        record.installation_context = vec![BUNDLE_CONTEXT.to_string()];

        let mut next = self.ledger.clone();
        for member in &record.dependencies {
            let Some(tool) = next.installations.get_mut(member) else {
                debug!("Bundle member '{}' is not tracked yet", member);
                continue;
            };
            if tool.installed_by_bundle.is_none() {
                tool.installed_by_bundle = Some(name.clone());
            }
            tool.add_context(&key);
        }
        let members = record.dependencies.len();
        next.installations.insert(key.clone(), record);

        self.commit(next)?;
        info!("Tracked bundle {} ({} tools)", name, members);
        Ok(())
    }

    /// Record a tool that was on the system before toolshed
    ///
    /// Permanent: the removal planner always keeps it.
    pub fn track_pre_existing(
        &mut self,
        name: &str,
        binary_path: &Path,
        version: &str,
    ) -> Result<()> {
        if self.ledger.is_installed(name) {
            return Err(Error::AlreadyTracked(name.to_string()));
        }

        let mut record = InstallationRecord::new(InstallMethod::PreExisting);
        record.version = version.to_string();
        record.binary_paths = vec![binary_path.to_path_buf()];
        record.user_requested = false;
        record.installation_context = vec![PRE_EXISTING_CONTEXT.to_string()];

        let mut next = self.ledger.clone();
        next.installations.insert(name.to_string(), record);
        self.commit(next)?;
        info!("Tracked pre-existing {} at {}", name, binary_path.display());
        Ok(())
    }

    /// Register a shared dependency or refresh its metadata
    ///
    /// The dependents list and original install time are preserved.
    pub fn track_dependency(&mut self, name: &str, config: DependencyConfig) -> Result<()> {
        let mut next = self.ledger.clone();
        let record = next
            .dependencies
            .entry(name.to_string())
            .or_insert_with(|| DependencyRecord::new(config.installer.as_str()));
        record.installer = config.installer;
        record.version = config.version;
        record.pre_existing = config.pre_existing;
        record.install_path = config.install_path;

        self.commit(next)?;
        info!("Tracked dependency {}", name);
        Ok(())
    }

    /// Drop an installation record and its dependent edges
    ///
    /// Dependency records stay; they become cleanup candidates once empty.
    pub fn untrack_installation(&mut self, name: &str) -> Result<InstallationRecord> {
        let mut next = self.ledger.clone();
        let record = detach_installation(&mut next, name)?;
        self.commit(next)?;
        info!("Untracked {}", name);
        Ok(record)
    }

    /// Drop a dependency record that nothing uses any more
    ///
    /// # Errors
    ///
    /// * `NotTracked` if there is no such dependency
    /// * `DependencyInUse` while dependents remain
    pub fn untrack_dependency(&mut self, name: &str) -> Result<DependencyRecord> {
        let existing = self
            .ledger
            .dependencies
            .get(name)
            .ok_or_else(|| Error::NotTracked(name.to_string()))?;
        if !existing.dependents.is_empty() {
            return Err(Error::DependencyInUse {
                name: name.to_string(),
                dependents: existing.dependents.clone(),
            });
        }

        let mut next = self.ledger.clone();
        let record = next
            .dependencies
            .remove(name)
            .ok_or_else(|| Error::NotTracked(name.to_string()))?;
        self.commit(next)?;
        info!("Untracked dependency {}", name);
        Ok(record)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.ledger.is_installed(name)
    }

    pub fn get_installation(&self, name: &str) -> Option<&InstallationRecord> {
        self.ledger.get(name)
    }

    /// Like `get_installation`, but a missing record is an error
    pub fn require_installation(&self, name: &str) -> Result<&InstallationRecord> {
        self.ledger.require(name)
    }

    pub fn get_all_installations(&self) -> &BTreeMap<String, InstallationRecord> {
        &self.ledger.installations
    }

    pub fn get_dependents(&self, dependency: &str) -> Vec<String> {
        self.ledger.recorded_dependents(dependency)
    }

    /// Whether removing `name` would leave every other installation intact
    pub fn can_safely_remove(&self, name: &str) -> Result<RemovalSafety> {
        self.ledger.check_removal(name)
    }

    pub fn get_installation_stats(&self) -> InstallationStats {
        self.ledger.stats()
    }

    pub fn cleanup_candidates(&self) -> Vec<String> {
        self.ledger.cleanup_candidates()
    }

    /// Look for an untracked `binary` on `PATH`
    pub fn detect_pre_existing(&self, name: &str, binary: &str) -> Option<PreExistingTool> {
        if self.ledger.is_installed(name) {
            return None;
        }
        which::which(binary).ok().map(|binary_path| {
            debug!("Found untracked {} at {}", name, binary_path.display());
            PreExistingTool {
                name: name.to_string(),
                binary_path,
            }
        })
    }

    /// Look for an untracked `binary` in an explicit search path
    pub fn detect_pre_existing_in<P: AsRef<OsStr>>(
        &self,
        name: &str,
        binary: &str,
        search_path: P,
    ) -> Option<PreExistingTool> {
        if self.ledger.is_installed(name) {
            return None;
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(binary, Some(search_path), cwd)
            .ok()
            .map(|binary_path| PreExistingTool {
                name: name.to_string(),
                binary_path,
            })
    }

    /// Record a carried-out removal plan
    ///
    /// Takes a `pre-removal` backup, untracks every removed installation, and
    /// drops dependency records the plan marked for removal. One save.
    pub fn apply_removal(&mut self, plan: &RemovalPlan) -> Result<AppliedRemoval> {
        let backup = self.store.backup(Some(PRE_REMOVAL_SUFFIX))?;

        let mut next = self.ledger.clone();
        let mut applied = AppliedRemoval {
            backup,
            ..Default::default()
        };

        for action in &plan.remove {
            match detach_installation(&mut next, &action.name) {
                Ok(_) => applied.untracked.push(action.name.clone()),
                Err(Error::NotTracked(_)) => {
                    warn!("'{}' was already untracked", action.name);
                }
                Err(e) => return Err(e),
            }
        }

        for dependency in plan
            .dependencies
            .iter()
            .filter(|d| d.action == DependencyFate::Remove)
        {
            let Some(record) = next.dependencies.get(&dependency.name) else {
                continue;
            };
            if !record.dependents.is_empty() {
                warn!(
                    "Keeping dependency '{}': still used by {}",
                    dependency.name,
                    record.dependents.join(", ")
                );
                continue;
            }
            next.dependencies.remove(&dependency.name);
            applied.dropped_dependencies.push(dependency.name.clone());
        }

        self.commit(next)?;
        info!(
            "Applied removal: {} untracked, {} dependencies dropped (backup {})",
            applied.untracked.len(),
            applied.dropped_dependencies.len(),
            applied.backup
        );
        Ok(applied)
    }

    /// Back up the current ledger
    pub fn snapshot(&mut self, suffix: Option<&str>) -> Result<String> {
        self.store.backup(suffix)
    }

    /// Restore a backup and reload it as the current ledger
    pub fn restore(&mut self, name: &str) -> Result<()> {
        self.ledger = self.store.restore_backup(name)?;
        info!("Tracker now using backup {}", name);
        Ok(())
    }

    pub fn list_backups(&self) -> Result<Vec<String>> {
        self.store.list_backups()
    }
}

fn attach_dependent(ledger: &mut Ledger, dependency: &str, dependent: &str) {
    let record = ledger
        .dependencies
        .entry(dependency.to_string())
        .or_insert_with(|| DependencyRecord::new(IMPLICIT_INSTALLER));
    if record.add_dependent(dependent) {
        debug!("'{}' now depends on '{}'", dependent, dependency);
    }
}

/// Remove `name` from `ledger` along with every edge pointing at it
fn detach_installation(ledger: &mut Ledger, name: &str) -> Result<InstallationRecord> {
    let record = ledger
        .installations
        .remove(name)
        .ok_or_else(|| Error::NotTracked(name.to_string()))?;

    for dependency in ledger.dependencies.values_mut() {
        dependency.remove_dependent(name);
    }

    if record.is_bundle() {
        let owner = bundle_name(name);
        for member in &record.dependencies {
            if let Some(tool) = ledger.installations.get_mut(member) {
                if tool.installed_by_bundle.as_deref() == Some(owner) {
                    tool.installed_by_bundle = None;
                }
                tool.installation_context.retain(|tag| tag != name);
            }
        }
    }

    Ok(record)
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
