// src/removal/validate.rs

//! Advisory checks over a finished removal plan
//!
//! Validation never changes the plan. It reports issues at three levels,
//! shaped by the planner's [`SafetyLevel`].

use crate::removal::SafetyLevel;
use crate::removal::plan::RemovalPlan;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Info,
    Warning,
    Error,
}

impl IssueLevel {
    pub fn as_str(&self) -> &str {
        match self {
            IssueLevel::Info => "info",
            IssueLevel::Warning => "warning",
            IssueLevel::Error => "error",
        }
    }
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.level == IssueLevel::Error)
    }

    pub fn count(&self, level: IssueLevel) -> usize {
        self.issues.iter().filter(|i| i.level == level).count()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, level: IssueLevel, subject: &str, message: String) {
        self.issues.push(ValidationIssue {
            level,
            subject: subject.to_string(),
            message,
        });
    }
}

/// Check a plan under the given safety level
pub fn validate_plan(plan: &RemovalPlan, safety: SafetyLevel) -> ValidationReport {
    let mut report = ValidationReport::default();

    for action in plan.remove.iter().filter(|a| a.forced) {
        report.push(
            IssueLevel::Error,
            &action.name,
            format!(
                "Forced removal of '{}' will break: {}",
                action.name,
                action.overridden_blockers.join(", ")
            ),
        );
    }

    for dependency in plan.dependencies.iter().filter(|d| d.affected.len() > 1) {
        report.push(
            IssueLevel::Warning,
            &dependency.name,
            format!(
                "Dependency '{}' is shared by {} tools: {}",
                dependency.name,
                dependency.affected.len(),
                dependency.affected.join(", ")
            ),
        );
    }

    match safety {
        SafetyLevel::Conservative => {
            for action in &plan.remove {
                report.push(
                    IssueLevel::Info,
                    &action.name,
                    format!("Review the removal of '{}' before executing", action.name),
                );
            }
        }
        SafetyLevel::Aggressive if plan.keep.len() > plan.remove.len() => {
            report.push(
                IssueLevel::Info,
                "plan",
                format!(
                    "{} targets are kept and only {} removed; use force to override dependent checks",
                    plan.keep.len(),
                    plan.remove.len()
                ),
            );
        }
        _ => {}
    }

    report
}
