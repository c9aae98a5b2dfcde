// tests/integration_test.rs

//! Integration tests for Toolshed
//!
//! These tests drive the tracker and planner against a real ledger file.

use std::fs;
use std::path::Path;
use tempfile::tempdir;
use toolshed::catalog::{self, Catalog};
use toolshed::ledger::InstallMethod;
use toolshed::removal::{DependencyFate, RemovalOptions, RemovalPlanner, SafetyLevel};
use toolshed::tracker::InstallConfig;
use toolshed::{Error, FileStore, LedgerStore, Tracker};

fn cargo_tool(deps: &[&str]) -> InstallConfig {
    let mut config = InstallConfig::new(InstallMethod::Cargo);
    config.dependencies = deps.iter().map(|d| d.to_string()).collect();
    config
}

/// Track ripgrep and fd, both depending on rust
fn search_tools(home: &Path) -> Tracker<FileStore> {
    let mut tracker = Tracker::open(FileStore::in_home(home)).unwrap();
    tracker
        .track_installation("ripgrep", cargo_tool(&["rust"]))
        .unwrap();
    tracker.track_installation("fd", cargo_tool(&["rust"])).unwrap();
    tracker
}

#[test]
fn test_ledger_survives_restart() {
    let dir = tempdir().unwrap();
    {
        let _tracker = search_tools(dir.path());
    }

    let tracker = Tracker::open(FileStore::in_home(dir.path())).unwrap();
    assert!(tracker.is_installed("ripgrep"));
    assert!(tracker.is_installed("fd"));
    assert_eq!(tracker.get_dependents("rust"), vec!["ripgrep", "fd"]);

    let raw = fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    assert!(raw.contains("\"schema_version\": \"1.0\""));
    assert!(!raw.contains("build_dir"), "absent optionals are omitted");
}

#[test]
fn test_scenario_shared_dependency_preserved() {
    let dir = tempdir().unwrap();
    let tracker = search_tools(dir.path());

    let catalog = Catalog::new();
    let planner = RemovalPlanner::new(tracker.ledger(), &catalog, SafetyLevel::Standard);
    let plan = planner.plan(&["ripgrep"], &RemovalOptions::default());

    assert!(plan.removes("ripgrep"));
    assert_eq!(plan.summary.will_remove, 1);
    let rust = plan.dependency_action("rust").unwrap();
    assert_eq!(rust.action, DependencyFate::Preserve);
    assert!(rust.reason.contains("fd"), "reason should name the survivor");
}

#[test]
fn test_scenario_cascade_removes_dependency() {
    let dir = tempdir().unwrap();
    let tracker = search_tools(dir.path());

    let catalog = Catalog::new();
    let options = RemovalOptions {
        cascade: true,
        ..Default::default()
    };
    let plan = RemovalPlanner::new(tracker.ledger(), &catalog, SafetyLevel::Standard)
        .plan(&["ripgrep", "fd"], &options);

    assert_eq!(plan.summary.will_remove, 2);
    assert_eq!(
        plan.dependency_action("rust").unwrap().action,
        DependencyFate::Remove
    );
}

#[test]
fn test_scenario_unknown_target() {
    let dir = tempdir().unwrap();
    let tracker = search_tools(dir.path());

    let catalog = Catalog::new();
    let plan = RemovalPlanner::new(tracker.ledger(), &catalog, SafetyLevel::Standard)
        .plan(&["nonexistent-tool"], &RemovalOptions::default());

    assert!(plan.remove.is_empty());
    assert!(plan.keep.is_empty());
    assert_eq!(plan.warnings.len(), 1);
}

#[test]
fn test_apply_removal_persists() {
    let dir = tempdir().unwrap();
    {
        let mut tracker = search_tools(dir.path());
        let catalog = Catalog::new();
        let plan = RemovalPlanner::new(tracker.ledger(), &catalog, SafetyLevel::Standard)
            .plan(&["ripgrep"], &RemovalOptions::default());
        tracker.apply_removal(&plan).unwrap();
    }

    let tracker = Tracker::open(FileStore::in_home(dir.path())).unwrap();
    assert!(!tracker.is_installed("ripgrep"));
    assert_eq!(tracker.get_dependents("rust"), vec!["fd"]);
    assert_eq!(tracker.list_backups().unwrap().len(), 1);
}

#[test]
fn test_apply_forced_removal() {
    let dir = tempdir().unwrap();
    let mut tracker = search_tools(dir.path());
    tracker
        .track_installation("rust", InstallConfig::new(InstallMethod::SourceBuild))
        .unwrap();

    let catalog = Catalog::new();
    let options = RemovalOptions {
        force: true,
        ..Default::default()
    };
    let planner = RemovalPlanner::new(tracker.ledger(), &catalog, SafetyLevel::Standard);
    let plan = planner.plan(&["rust"], &options);
    let report = planner.validate_plan(&plan);
    assert!(plan.removes("rust"));
    assert!(report.has_errors());

    let applied = tracker.apply_removal(&plan).unwrap();
    assert_eq!(applied.untracked, vec!["rust"]);
    assert!(!tracker.is_installed("rust"));
    assert!(tracker.is_installed("ripgrep"));
    assert!(tracker.is_installed("fd"));
}

#[test]
fn test_unsupported_version_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let manifest = dir.path().join("manifest.json");
    let future = r#"{"schema_version": "2.0", "installations": {}, "tools": []}"#;
    fs::write(&manifest, future).unwrap();

    let result = Tracker::open(FileStore::in_home(dir.path()));
    assert!(matches!(
        result,
        Err(Error::UnsupportedSchemaVersion { ref found, .. }) if found == "2.0"
    ));
    assert_eq!(fs::read_to_string(&manifest).unwrap(), future);
}

#[test]
fn test_restore_snapshots_current_state() {
    let dir = tempdir().unwrap();
    let mut tracker = Tracker::open(FileStore::in_home(dir.path())).unwrap();
    let empty = tracker.snapshot(None).unwrap();

    tracker.track_installation("fd", cargo_tool(&[])).unwrap();
    tracker.restore(&empty).unwrap();
    assert!(!tracker.is_installed("fd"));

    let backups = tracker.list_backups().unwrap();
    assert_eq!(backups.len(), 2);
    let pre_restore = backups
        .iter()
        .find(|name| name.contains("pre-restore"))
        .unwrap();

    // Undo the restore
    tracker.restore(pre_restore).unwrap();
    assert!(tracker.is_installed("fd"));
}

#[test]
fn test_second_tracker_cannot_take_lock() {
    let dir = tempdir().unwrap();
    let first = Tracker::open(FileStore::in_home(dir.path())).unwrap();

    let second = Tracker::open(FileStore::in_home(dir.path()));
    assert!(matches!(second, Err(Error::LockUnavailable { .. })));

    drop(first);
    assert!(Tracker::open(FileStore::in_home(dir.path())).is_ok());
}

#[test]
fn test_track_bundle_from_catalog() {
    let dir = tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.toml");
    fs::write(
        &catalog_path,
        r#"
[tools.fd]
package = "fd-find"

[bundles.core]
tools = ["git"]

[bundles.search]
tools = ["ripgrep", "fd", "git"]
bundles = ["core"]
"#,
    )
    .unwrap();
    let catalog = Catalog::load(&catalog_path).unwrap();

    let mut tracker = search_tools(dir.path());
    let tools = catalog::expand_tools(&catalog, "search").unwrap();
    assert_eq!(tools, vec!["git", "ripgrep", "fd"]);
    tracker.track_bundle("search", &tools, true).unwrap();

    let options = RemovalOptions {
        remove_bundle_contents: true,
        cascade: true,
        ..Default::default()
    };
    let plan = RemovalPlanner::new(tracker.ledger(), &catalog, SafetyLevel::Standard)
        .plan(&["search"], &options);

    assert!(plan.removes("bundle:search"));
    assert!(plan.removes("ripgrep"));
    assert_eq!(
        plan.remove_action("fd").unwrap().method.command_line().unwrap(),
        "cargo uninstall fd-find"
    );
    // git was never tracked
    assert!(!plan.removes("git"));
    assert_eq!(
        plan.dependency_action("rust").unwrap().action,
        DependencyFate::Remove
    );
}

#[test]
fn test_store_round_trip_through_trait() {
    let dir = tempdir().unwrap();
    let mut store = FileStore::in_home(&dir.path().join("nested"));
    let mut ledger = store.load().unwrap();

    let mut record = toolshed::ledger::InstallationRecord::new(InstallMethod::Pip);
    record.version = "3.2.4".to_string();
    ledger
        .installations
        .insert("httpie".to_string(), record);
    store.save(&mut ledger).unwrap();

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.installations, ledger.installations);
    assert_eq!(reloaded.dependencies, ledger.dependencies);
    assert_eq!(reloaded.schema_version, "1.0");
}
