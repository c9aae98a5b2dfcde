// src/removal/mod.rs

//! Safe-removal planning
//!
//! The planner reads the ledger and the catalog and produces a
//! [`RemovalPlan`]: what to remove and how, what to keep and why, and what
//! happens to each shared dependency afterwards. It does no I/O and never
//! mutates the ledger. "Not safe" and "not tracked" are plan data, not errors.

pub mod plan;
pub mod validate;

pub use plan::{
    DependencyAction, DependencyFate, KeepDecision, PlanSummary, PlanWarning, RemovalMethod,
    RemovalPlan, RemoveAction, WarningLevel,
};
pub use validate::{IssueLevel, ValidationIssue, ValidationReport, validate_plan};

use crate::catalog::Catalog;
use crate::ledger::models::{
    InstallationRecord, Ledger, PRE_EXISTING_CONTEXT, bundle_key, bundle_name, is_bundle_key,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Policy knob for plan validation; planning itself is unaffected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Conservative,
    #[default]
    Standard,
    Aggressive,
}

impl SafetyLevel {
    pub fn as_str(&self) -> &str {
        match self {
            SafetyLevel::Conservative => "conservative",
            SafetyLevel::Standard => "standard",
            SafetyLevel::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(SafetyLevel::Conservative),
            "standard" => Ok(SafetyLevel::Standard),
            "aggressive" => Ok(SafetyLevel::Aggressive),
            _ => Err(format!("Invalid safety level: {}", s)),
        }
    }
}

/// Caller choices for a removal plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOptions {
    /// Remove tools even when other installations depend on them
    pub force: bool,
    /// Remove shared dependencies left with no dependents
    pub cascade: bool,
    /// Include tracked config files in remove actions
    pub remove_config_files: bool,
    /// Analyze every member tool of a removed bundle
    pub remove_bundle_contents: bool,
}

/// Working state while a plan is being built
#[derive(Debug, Default)]
struct PlanState {
    remove: Vec<RemoveAction>,
    keep: Vec<KeepDecision>,
    warnings: Vec<PlanWarning>,
    analyzed: HashSet<String>,
    /// Bundle records this plan removes; they do not block their members
    removing_bundles: HashSet<String>,
}

pub struct RemovalPlanner<'a> {
    ledger: &'a Ledger,
    catalog: &'a Catalog,
    safety: SafetyLevel,
}

impl<'a> RemovalPlanner<'a> {
    pub fn new(ledger: &'a Ledger, catalog: &'a Catalog, safety: SafetyLevel) -> Self {
        Self {
            ledger,
            catalog,
            safety,
        }
    }

    /// Build a removal plan for `targets`
    ///
    /// Targets may be tool names, bundle names, or `bundle:<name>` keys.
    /// Every name is analyzed at most once, however many times it is reached.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S], options: &RemovalOptions) -> RemovalPlan {
        let targets: Vec<String> = targets.iter().map(|t| t.as_ref().to_string()).collect();
        let mut state = PlanState::default();

        // Bundles named anywhere in the request stop blocking their members
        for target in &targets {
            if let Some(key) = self.resolve_bundle(target) {
                if self.ledger.is_installed(&key) {
                    state.removing_bundles.insert(key);
                }
            }
        }

        for target in &targets {
            self.analyze_target(target, options, &mut state);
        }

        let dependencies = self.dependency_actions(&state.remove, options);
        let plan = RemovalPlan::new(
            targets,
            state.remove,
            state.keep,
            dependencies,
            state.warnings,
        );

        info!(
            "Removal plan: {} to remove, {} to keep, {} dependency actions, {} warnings",
            plan.summary.will_remove,
            plan.summary.will_keep,
            plan.dependencies.len(),
            plan.summary.warnings
        );
        plan
    }

    /// Run the advisory checks for this planner's safety level
    pub fn validate_plan(&self, plan: &RemovalPlan) -> ValidationReport {
        validate_plan(plan, self.safety)
    }

    /// Ledger key of the bundle `target` refers to, if it refers to one
    fn resolve_bundle(&self, target: &str) -> Option<String> {
        if is_bundle_key(target) {
            return Some(target.to_string());
        }

        let key = bundle_key(target);
        if self.ledger.is_installed(&key) {
            return Some(key);
        }

        // A tracked tool wins over a catalog bundle of the same name
        if !self.ledger.is_installed(target) && self.catalog.has_bundle(target) {
            return Some(key);
        }

        None
    }

    fn analyze_target(&self, target: &str, options: &RemovalOptions, state: &mut PlanState) {
        match self.resolve_bundle(target) {
            Some(key) => self.analyze_bundle(&key, options, state),
            None => self.analyze_tool(target, options, None, state),
        }
    }

    /// Per-tool analysis; `target` is never reinterpreted as a bundle
    fn analyze_tool(
        &self,
        target: &str,
        options: &RemovalOptions,
        via_bundle: Option<&str>,
        state: &mut PlanState,
    ) {
        if !state.analyzed.insert(target.to_string()) {
            debug!("'{}' already analyzed for this plan", target);
            return;
        }

        let Some(record) = self.ledger.get(target) else {
            state.warnings.push(PlanWarning::info(
                target,
                format!("'{}' is not tracked; nothing to remove", target),
            ));
            return;
        };

        if record.is_pre_existing() {
            if options.force {
                debug!("Ignoring force for pre-existing '{}'", target);
            }
            state.keep.push(KeepDecision {
                name: target.to_string(),
                reasons: vec![PRE_EXISTING_CONTEXT.to_string()],
                blockers: Vec::new(),
            });
            return;
        }

        let blockers: Vec<String> = self
            .ledger
            .blockers_of(target)
            .into_iter()
            .filter(|blocker| !state.removing_bundles.contains(blocker))
            .collect();

        if blockers.is_empty() {
            let action = self.remove_action(target, record, options, via_bundle, Vec::new());
            state.remove.push(action);
        } else if options.force {
            warn!(
                "Forcing removal of '{}' despite dependents: {}",
                target,
                blockers.join(", ")
            );
            state.warnings.push(PlanWarning::warning(
                target,
                format!(
                    "Forcing removal of '{}'; still required by {}",
                    target,
                    blockers.join(", ")
                ),
            ));
            let action = self.remove_action(target, record, options, via_bundle, blockers);
            state.remove.push(action);
        } else {
            state.keep.push(KeepDecision {
                name: target.to_string(),
                reasons: blockers
                    .iter()
                    .map(|b| format!("required by {}", b))
                    .collect(),
                blockers,
            });
        }
    }

    fn analyze_bundle(&self, key: &str, options: &RemovalOptions, state: &mut PlanState) {
        if !state.analyzed.insert(key.to_string()) {
            debug!("Bundle '{}' already analyzed for this plan", key);
            return;
        }

        let name = bundle_name(key);
        let Some(record) = self.ledger.get(key) else {
            state.warnings.push(PlanWarning::info(
                key,
                format!("Bundle '{}' is not tracked; nothing to remove", name),
            ));
            return;
        };

        state.removing_bundles.insert(key.to_string());
        state.remove.push(RemoveAction {
            name: key.to_string(),
            method: RemovalMethod::BundleRemove,
            paths: Vec::new(),
            config_files: Vec::new(),
            forced: false,
            overridden_blockers: Vec::new(),
            via_bundle: None,
        });

        if options.remove_bundle_contents {
            // Members are tools unless explicitly keyed as bundles
            for member in &record.dependencies {
                if is_bundle_key(member) {
                    self.analyze_bundle(member, options, state);
                } else {
                    self.analyze_tool(member, options, Some(name), state);
                }
            }
        } else if !record.dependencies.is_empty() {
            state.warnings.push(PlanWarning::info(
                key,
                format!(
                    "Member tools of bundle '{}' remain installed: {}",
                    name,
                    record.dependencies.join(", ")
                ),
            ));
        }
    }

    fn remove_action(
        &self,
        name: &str,
        record: &InstallationRecord,
        options: &RemovalOptions,
        via_bundle: Option<&str>,
        overridden_blockers: Vec<String>,
    ) -> RemoveAction {
        let package = self.catalog.package_name(name);
        let method = RemovalMethod::for_install(record.method, package, &record.system_packages);

        let mut paths = record.binary_paths.clone();
        if let Some(build_dir) = &record.build_dir {
            paths.push(build_dir.clone());
        }

        let config_files = if options.remove_config_files {
            record.config_files.clone()
        } else {
            Vec::new()
        };

        RemoveAction {
            name: name.to_string(),
            method,
            paths,
            config_files,
            forced: !overridden_blockers.is_empty(),
            overridden_blockers,
            via_bundle: via_bundle.map(str::to_string),
        }
    }

    /// Decide the fate of every dependency the removed tools used
    fn dependency_actions(
        &self,
        remove: &[RemoveAction],
        options: &RemovalOptions,
    ) -> Vec<DependencyAction> {
        let removing: HashSet<&str> = remove.iter().map(|a| a.name.as_str()).collect();

        let mut seen = HashSet::new();
        let mut referenced = Vec::new();
        for action in remove {
            let Some(record) = self.ledger.get(&action.name) else {
                continue;
            };
            if record.is_bundle() {
                continue;
            }
            for dependency in &record.dependencies {
                if seen.insert(dependency.as_str()) {
                    referenced.push(dependency.as_str());
                }
            }
        }

        referenced
            .into_iter()
            .map(|dependency| {
                let affected = self.ledger.users_of(dependency);
                let remaining: Vec<String> = affected
                    .iter()
                    .filter(|d| !removing.contains(d.as_str()))
                    .cloned()
                    .collect();

                let pre_existing = self
                    .ledger
                    .dependencies
                    .get(dependency)
                    .is_some_and(|d| d.pre_existing)
                    || self
                        .ledger
                        .get(dependency)
                        .is_some_and(|r| r.is_pre_existing());

                let (action, reason) = if !remaining.is_empty() {
                    (
                        DependencyFate::Preserve,
                        format!("still required by {}", remaining.join(", ")),
                    )
                } else if pre_existing {
                    (
                        DependencyFate::Preserve,
                        "pre-existing; never removed".to_string(),
                    )
                } else if options.cascade {
                    (DependencyFate::Remove, "no remaining dependents".to_string())
                } else {
                    (
                        DependencyFate::Preserve,
                        "no remaining dependents; cascade not requested".to_string(),
                    )
                };

                debug!("Dependency '{}': {} ({})", dependency, action.as_str(), reason);
                DependencyAction {
                    name: dependency.to_string(),
                    action,
                    reason,
                    affected,
                    remaining,
                }
            })
            .collect()
    }
}
