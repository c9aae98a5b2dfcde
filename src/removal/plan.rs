// src/removal/plan.rs

//! Removal plan data
//!
//! A plan is rebuilt on every call and never persisted. It serializes to JSON
//! for display and for handing to whatever actually deletes files.

use crate::ledger::models::InstallMethod;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How an installation gets taken off the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemovalMethod {
    /// Delete binaries and build directories directly
    DeleteArtifacts,
    /// Run the language package manager's uninstall
    ToolUninstall { manager: String, command: Vec<String> },
    /// Uninstall through the system package manager
    SystemPackageUninstall { packages: Vec<String> },
    /// Drop the bundle record; owns no files
    BundleRemove,
}

impl RemovalMethod {
    pub fn as_str(&self) -> &str {
        match self {
            RemovalMethod::DeleteArtifacts => "delete_artifacts",
            RemovalMethod::ToolUninstall { .. } => "tool_uninstall",
            RemovalMethod::SystemPackageUninstall { .. } => "system_package_uninstall",
            RemovalMethod::BundleRemove => "bundle_remove",
        }
    }

    /// Map a recorded install method to its removal method
    ///
    /// # Arguments
    ///
    /// * `method` - The recorded install method
    /// * `package` - Package-manager package name for uninstall commands
    /// * `system_packages` - Recorded system packages, for system installs
    pub fn for_install(method: InstallMethod, package: &str, system_packages: &[String]) -> Self {
        let uninstall = |manager: &str, args: &[&str]| RemovalMethod::ToolUninstall {
            manager: manager.to_string(),
            command: args
                .iter()
                .map(|a| a.to_string())
                .chain(std::iter::once(package.to_string()))
                .collect(),
        };

        match method {
            InstallMethod::Cargo => uninstall("cargo", &["cargo", "uninstall"]),
            InstallMethod::Pip => uninstall("pip", &["pip", "uninstall", "-y"]),
            InstallMethod::Npm => uninstall("npm", &["npm", "uninstall", "-g"]),
            InstallMethod::Gem => uninstall("gem", &["gem", "uninstall", "-x"]),
            // go has no uninstall; the binary is the whole install
            InstallMethod::Go => RemovalMethod::DeleteArtifacts,
            InstallMethod::SystemPackage => RemovalMethod::SystemPackageUninstall {
                packages: if system_packages.is_empty() {
                    vec![package.to_string()]
                } else {
                    system_packages.to_vec()
                },
            },
            InstallMethod::Bundle => RemovalMethod::BundleRemove,
            InstallMethod::SourceBuild
            | InstallMethod::ManualDownload
            | InstallMethod::PreExisting => RemovalMethod::DeleteArtifacts,
        }
    }

    /// Shell-ready command line, for the uninstall variants
    pub fn command_line(&self) -> Option<String> {
        match self {
            RemovalMethod::ToolUninstall { command, .. } => Some(command.join(" ")),
            RemovalMethod::SystemPackageUninstall { packages } => {
                Some(format!("<system package manager> remove {}", packages.join(" ")))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveAction {
    pub name: String,
    pub method: RemovalMethod,
    /// Binary paths and build directory to delete
    pub paths: Vec<PathBuf>,
    /// Tracked config files, only when config removal was requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<PathBuf>,
    pub forced: bool,
    /// Dependents that would have blocked this removal without `force`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overridden_blockers: Vec<String>,
    /// Set when the removal came from expanding a bundle's contents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_bundle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeepDecision {
    pub name: String,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyFate {
    Remove,
    Preserve,
}

impl DependencyFate {
    pub fn as_str(&self) -> &str {
        match self {
            DependencyFate::Remove => "remove",
            DependencyFate::Preserve => "preserve",
        }
    }
}

/// What happens to a shared dependency once the plan's removals are done
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyAction {
    pub name: String,
    pub action: DependencyFate,
    pub reason: String,
    /// Every current dependent
    pub affected: Vec<String>,
    /// Dependents that survive this plan
    pub remaining: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanWarning {
    pub level: WarningLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

impl PlanWarning {
    pub fn info(subject: &str, message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Info,
            subject: Some(subject.to_string()),
            message: message.into(),
        }
    }

    pub fn warning(subject: &str, message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Warning,
            subject: Some(subject.to_string()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub requested: usize,
    pub will_remove: usize,
    pub will_keep: usize,
    pub warnings: usize,
    pub by_method: BTreeMap<String, usize>,
    pub by_dependency_action: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalPlan {
    pub targets: Vec<String>,
    pub remove: Vec<RemoveAction>,
    pub keep: Vec<KeepDecision>,
    pub dependencies: Vec<DependencyAction>,
    pub warnings: Vec<PlanWarning>,
    pub summary: PlanSummary,
}

impl RemovalPlan {
    /// Assemble a plan and compute its summary
    pub fn new(
        targets: Vec<String>,
        remove: Vec<RemoveAction>,
        keep: Vec<KeepDecision>,
        dependencies: Vec<DependencyAction>,
        warnings: Vec<PlanWarning>,
    ) -> Self {
        let mut summary = PlanSummary {
            requested: targets.len(),
            will_remove: remove.len(),
            will_keep: keep.len(),
            warnings: warnings.len(),
            ..Default::default()
        };
        for action in &remove {
            *summary
                .by_method
                .entry(action.method.as_str().to_string())
                .or_insert(0) += 1;
        }
        for action in &dependencies {
            *summary
                .by_dependency_action
                .entry(action.action.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            targets,
            remove,
            keep,
            dependencies,
            warnings,
            summary,
        }
    }

    pub fn removes(&self, name: &str) -> bool {
        self.remove.iter().any(|a| a.name == name)
    }

    pub fn keeps(&self, name: &str) -> bool {
        self.keep.iter().any(|k| k.name == name)
    }

    pub fn remove_action(&self, name: &str) -> Option<&RemoveAction> {
        self.remove.iter().find(|a| a.name == name)
    }

    pub fn keep_decision(&self, name: &str) -> Option<&KeepDecision> {
        self.keep.iter().find(|k| k.name == name)
    }

    pub fn dependency_action(&self, name: &str) -> Option<&DependencyAction> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    /// Nothing to remove and nothing to decide
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.dependencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninstall_commands() {
        let cargo = RemovalMethod::for_install(InstallMethod::Cargo, "fd-find", &[]);
        assert_eq!(cargo.command_line().unwrap(), "cargo uninstall fd-find");

        let pip = RemovalMethod::for_install(InstallMethod::Pip, "httpie", &[]);
        assert_eq!(pip.command_line().unwrap(), "pip uninstall -y httpie");

        let npm = RemovalMethod::for_install(InstallMethod::Npm, "prettier", &[]);
        assert_eq!(npm.command_line().unwrap(), "npm uninstall -g prettier");
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(
            RemovalMethod::for_install(InstallMethod::SourceBuild, "neovim", &[]),
            RemovalMethod::DeleteArtifacts
        );
        assert_eq!(
            RemovalMethod::for_install(InstallMethod::ManualDownload, "gh", &[]),
            RemovalMethod::DeleteArtifacts
        );
        assert_eq!(
            RemovalMethod::for_install(InstallMethod::Go, "gopls", &[]),
            RemovalMethod::DeleteArtifacts
        );
        assert_eq!(
            RemovalMethod::for_install(InstallMethod::Bundle, "bundle:web", &[]),
            RemovalMethod::BundleRemove
        );
        assert_eq!(
            RemovalMethod::for_install(
                InstallMethod::SystemPackage,
                "jq",
                &["jq".to_string(), "libonig5".to_string()]
            ),
            RemovalMethod::SystemPackageUninstall {
                packages: vec!["jq".to_string(), "libonig5".to_string()]
            }
        );
    }

    #[test]
    fn test_summary_counts() {
        let remove = vec![RemoveAction {
            name: "fd".to_string(),
            method: RemovalMethod::for_install(InstallMethod::Cargo, "fd-find", &[]),
            paths: Vec::new(),
            config_files: Vec::new(),
            forced: false,
            overridden_blockers: Vec::new(),
            via_bundle: None,
        }];
        let dependencies = vec![DependencyAction {
            name: "rust".to_string(),
            action: DependencyFate::Preserve,
            reason: "still required by ripgrep".to_string(),
            affected: vec!["fd".to_string(), "ripgrep".to_string()],
            remaining: vec!["ripgrep".to_string()],
        }];
        let plan = RemovalPlan::new(
            vec!["fd".to_string(), "ghost".to_string()],
            remove,
            Vec::new(),
            dependencies,
            vec![PlanWarning::info("ghost", "'ghost' is not tracked")],
        );

        assert_eq!(plan.summary.requested, 2);
        assert_eq!(plan.summary.will_remove, 1);
        assert_eq!(plan.summary.will_keep, 0);
        assert_eq!(plan.summary.warnings, 1);
        assert_eq!(plan.summary.by_method.get("tool_uninstall"), Some(&1));
        assert_eq!(plan.summary.by_dependency_action.get("preserve"), Some(&1));
        assert!(plan.removes("fd"));
        assert!(!plan.keeps("fd"));
    }

    #[test]
    fn test_plan_serializes() {
        let plan = RemovalPlan::new(Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["summary"]["will_remove"], 0);
        assert!(plan.is_empty());

        let method = serde_json::to_value(RemovalMethod::BundleRemove).unwrap();
        assert_eq!(method["kind"], "bundle_remove");
    }
}
