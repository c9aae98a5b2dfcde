// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use toolshed::catalog::{self, Catalog};
use toolshed::ledger::paths;
use toolshed::ledger::InstallMethod;
use toolshed::removal::{
    RemovalOptions, RemovalPlan, RemovalPlanner, SafetyLevel, ValidationReport,
};
use toolshed::tracker::{DependencyConfig, InstallConfig};
use toolshed::{FileStore, Tracker};
use tracing::info;

#[derive(Parser)]
#[command(name = "toolshed")]
#[command(author, version, about = "Installation ledger and safe-removal planner for developer tools", long_about = None)]
struct Cli {
    /// Toolshed home directory (default: $TOOLSHED_HOME or ~/.toolshed)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Tool and bundle catalog (default: <home>/catalog.toml if present)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger if it does not exist
    Init,
    /// List tracked installations
    List,
    /// Show installation statistics
    Stats,
    /// Record an installed tool
    Track {
        /// Tool name
        name: String,
        /// Install method (source_build, cargo, pip, npm, go, gem, system_package, manual_download)
        #[arg(short, long, default_value = "source_build")]
        method: String,
        /// Installed version
        #[arg(long = "tool-version", default_value = "")]
        tool_version: String,
        /// Shared dependency this tool uses (repeatable)
        #[arg(short, long = "dep")]
        deps: Vec<String>,
        /// Installed binary path (repeatable)
        #[arg(short, long = "bin")]
        bins: Vec<PathBuf>,
        /// Build directory left behind by a source build
        #[arg(long)]
        build_dir: Option<PathBuf>,
        /// Source repository or download URL
        #[arg(long)]
        source: Option<String>,
        /// Config file owned by the tool (repeatable)
        #[arg(long = "config-file")]
        config_files: Vec<PathBuf>,
        /// System package installed for the tool (repeatable)
        #[arg(long = "system-package")]
        system_packages: Vec<String>,
        /// Bundle that installed this tool
        #[arg(long)]
        bundle: Option<String>,
        /// Context tag (repeatable)
        #[arg(long = "context")]
        contexts: Vec<String>,
        /// Installed as a dependency rather than at the user's request
        #[arg(long)]
        as_dependency: bool,
    },
    /// Record an installed bundle
    TrackBundle {
        /// Bundle name
        name: String,
        /// Member tool (repeatable; default: expand the bundle from the catalog)
        #[arg(short, long = "tool")]
        tools: Vec<String>,
        /// Installed as part of something else rather than at the user's request
        #[arg(long)]
        as_dependency: bool,
    },
    /// Record a shared dependency or refresh its metadata
    TrackDependency {
        /// Dependency name
        name: String,
        /// Installer that manages it (rustup, nvm, pyenv, ...)
        #[arg(short, long)]
        installer: String,
        /// Installed version
        #[arg(long = "tool-version", default_value = "")]
        tool_version: String,
        /// Install location
        #[arg(long)]
        path: Option<PathBuf>,
        /// It was on the system before toolshed
        #[arg(long)]
        pre_existing: bool,
    },
    /// Detect a tool already on PATH and record it as pre-existing
    Adopt {
        /// Tool name
        name: String,
        /// Binary to look for (default: catalog binary name, then the tool name)
        #[arg(short, long)]
        binary: Option<String>,
        /// Installed version
        #[arg(long = "tool-version", default_value = "")]
        tool_version: String,
    },
    /// Stop tracking an installation
    Untrack {
        /// Installation name
        name: String,
    },
    /// Show the dependents of a shared dependency
    Dependents {
        /// Dependency name
        name: String,
    },
    /// Check whether an installation can be removed safely
    Check {
        /// Installation name
        name: String,
    },
    /// List dependencies with no dependents, optionally dropping them
    Cleanup {
        /// Drop the cleanup candidates from the ledger
        #[arg(long)]
        apply: bool,
    },
    /// Build a removal plan
    Plan {
        /// Tools or bundles to remove
        #[arg(required = true)]
        targets: Vec<String>,
        /// Remove tools even if other installations depend on them
        #[arg(short, long)]
        force: bool,
        /// Remove shared dependencies left without dependents
        #[arg(short, long)]
        cascade: bool,
        /// Include tracked config files
        #[arg(long)]
        remove_config: bool,
        /// Also remove the member tools of removed bundles
        #[arg(long)]
        remove_bundle_contents: bool,
        /// Validation safety level (conservative, standard, aggressive)
        #[arg(short, long, default_value = "standard")]
        safety: String,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        /// Record the plan in the ledger after the files were removed
        #[arg(long)]
        apply: bool,
    },
    /// Expand a catalog bundle
    Expand {
        /// Bundle name
        bundle: String,
        /// Expand system packages for this package manager instead of tools
        #[arg(long)]
        packages: Option<String>,
    },
    /// Back up the ledger
    Backup {
        /// Suffix appended to the backup name
        #[arg(short, long)]
        suffix: Option<String>,
    },
    /// List ledger backups
    Backups,
    /// Restore the ledger from a backup
    Restore {
        /// Backup file name
        name: String,
    },
}

/// JSON output for `plan --json`
#[derive(Serialize)]
struct PlanOutput<'a> {
    plan: &'a RemovalPlan,
    validation: &'a ValidationReport,
}

fn open_tracker(home: &Path) -> Result<Tracker<FileStore>> {
    Tracker::open(FileStore::in_home(home))
        .with_context(|| format!("Failed to open ledger in {}", home.display()))
}

fn load_catalog(home: &Path, explicit: Option<&Path>) -> Result<Catalog> {
    let catalog = match explicit {
        Some(path) => Catalog::load(path)?,
        None => Catalog::load_or_empty(&paths::catalog_path(home))?,
    };
    Ok(catalog)
}

fn print_plan(plan: &RemovalPlan, report: &ValidationReport) {
    println!(
        "Removal plan for {} target(s): {} to remove, {} to keep",
        plan.summary.requested, plan.summary.will_remove, plan.summary.will_keep
    );

    for action in &plan.remove {
        println!("  remove {} [{}]", action.name, action.method.as_str());
        if let Some(command) = action.method.command_line() {
            println!("    run: {}", command);
        }
        for path in action.paths.iter().chain(&action.config_files) {
            println!("    delete: {}", path.display());
        }
        if let Some(bundle) = &action.via_bundle {
            println!("    from bundle: {}", bundle);
        }
    }

    for keep in &plan.keep {
        println!("  keep {} ({})", keep.name, keep.reasons.join("; "));
    }

    for dependency in &plan.dependencies {
        println!(
            "  dependency {}: {} ({})",
            dependency.name,
            dependency.action.as_str(),
            dependency.reason
        );
    }

    for warning in &plan.warnings {
        println!("  note: {}", warning.message);
    }

    for issue in &report.issues {
        println!("  [{}] {}", issue.level, issue.message);
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let home = paths::resolve_home(cli.home.as_deref())?;
    let catalog_path = cli.catalog.as_deref();

    match cli.command {
        Some(Commands::Init) => {
            let tracker = open_tracker(&home)?;
            println!(
                "Ledger ready at {} ({} installations)",
                tracker.store().path().display(),
                tracker.get_all_installations().len()
            );
            Ok(())
        }
        Some(Commands::List) => {
            let tracker = open_tracker(&home)?;
            let installations = tracker.get_all_installations();
            if installations.is_empty() {
                println!("No tools tracked");
                return Ok(());
            }

            println!("Tracked installations ({}):", installations.len());
            for (name, record) in installations {
                let version = if record.version.is_empty() {
                    "-"
                } else {
                    record.version.as_str()
                };
                let mut line = format!("  {} {} [{}]", name, version, record.method);
                if let Some(bundle) = &record.installed_by_bundle {
                    line.push_str(&format!(" (bundle: {})", bundle));
                }
                if !record.dependencies.is_empty() {
                    line.push_str(&format!(" -> {}", record.dependencies.join(", ")));
                }
                println!("{}", line);
            }
            Ok(())
        }
        Some(Commands::Stats) => {
            let tracker = open_tracker(&home)?;
            let stats = tracker.get_installation_stats();
            println!("Installations: {}", stats.total);
            println!("  Tools: {}", stats.tools);
            println!("  Bundles: {}", stats.bundles);
            println!("  User requested: {}", stats.user_requested);
            for (method, count) in &stats.by_method {
                println!("  {}: {}", method, count);
            }
            println!("Dependencies: {}", stats.dependencies);
            println!("  Cleanup candidates: {}", stats.cleanup_eligible);
            Ok(())
        }
        Some(Commands::Track {
            name,
            method,
            tool_version,
            deps,
            bins,
            build_dir,
            source,
            config_files,
            system_packages,
            bundle,
            contexts,
            as_dependency,
        }) => {
            let method: InstallMethod = method.parse().map_err(anyhow::Error::msg)?;
            let mut config = InstallConfig::new(method);
            config.version = tool_version;
            config.dependencies = deps;
            config.binary_paths = bins;
            config.build_dir = build_dir;
            config.source_repo = source;
            config.config_files = config_files;
            config.system_packages = system_packages;
            config.installed_by_bundle = bundle;
            config.installation_context = contexts;
            config.user_requested = !as_dependency;

            let mut tracker = open_tracker(&home)?;
            tracker.track_installation(&name, config)?;
            println!("Tracked {} ({})", name, method);
            Ok(())
        }
        Some(Commands::TrackBundle {
            name,
            tools,
            as_dependency,
        }) => {
            let tools = if tools.is_empty() {
                let catalog = load_catalog(&home, catalog_path)?;
                catalog::expand_tools(&catalog, &name)
                    .with_context(|| format!("Failed to expand bundle '{}'", name))?
            } else {
                tools
            };

            let mut tracker = open_tracker(&home)?;
            tracker.track_bundle(&name, &tools, !as_dependency)?;
            println!("Tracked bundle {} ({} tools)", name, tools.len());
            Ok(())
        }
        Some(Commands::TrackDependency {
            name,
            installer,
            tool_version,
            path,
            pre_existing,
        }) => {
            let mut config = DependencyConfig::new(&installer);
            config.version = tool_version;
            config.install_path = path;
            config.pre_existing = pre_existing;

            let mut tracker = open_tracker(&home)?;
            tracker.track_dependency(&name, config)?;
            println!("Tracked dependency {} ({})", name, installer);
            Ok(())
        }
        Some(Commands::Adopt {
            name,
            binary,
            tool_version,
        }) => {
            let catalog = load_catalog(&home, catalog_path)?;
            let binary = binary.unwrap_or_else(|| catalog.binary_name(&name).to_string());

            let mut tracker = open_tracker(&home)?;
            if tracker.is_installed(&name) {
                println!("{} is already tracked", name);
                return Ok(());
            }

            match tracker.detect_pre_existing(&name, &binary) {
                Some(found) => {
                    tracker.track_pre_existing(&name, &found.binary_path, &tool_version)?;
                    println!(
                        "Adopted {} as pre-existing ({})",
                        name,
                        found.binary_path.display()
                    );
                }
                None => println!("{} not found on PATH", binary),
            }
            Ok(())
        }
        Some(Commands::Untrack { name }) => {
            let mut tracker = open_tracker(&home)?;
            let record = tracker.untrack_installation(&name)?;
            println!("Untracked {} ({})", name, record.method);
            Ok(())
        }
        Some(Commands::Dependents { name }) => {
            let tracker = open_tracker(&home)?;
            let dependents = tracker.get_dependents(&name);
            if dependents.is_empty() {
                println!("Nothing depends on {}", name);
            } else {
                println!("{} is used by:", name);
                for dependent in dependents {
                    println!("  {}", dependent);
                }
            }
            Ok(())
        }
        Some(Commands::Check { name }) => {
            let tracker = open_tracker(&home)?;
            let safety = tracker.can_safely_remove(&name)?;
            if safety.is_safe() {
                println!("{} can be removed safely", name);
            } else {
                println!("{} should not be removed: {}", name, safety.reasons().join("; "));
            }
            Ok(())
        }
        Some(Commands::Cleanup { apply }) => {
            let mut tracker = open_tracker(&home)?;
            let candidates = tracker.cleanup_candidates();
            if candidates.is_empty() {
                println!("No unused dependencies");
                return Ok(());
            }

            for name in &candidates {
                if apply {
                    tracker.untrack_dependency(name)?;
                    println!("Dropped {}", name);
                } else {
                    println!("  {}", name);
                }
            }
            Ok(())
        }
        Some(Commands::Plan {
            targets,
            force,
            cascade,
            remove_config,
            remove_bundle_contents,
            safety,
            json,
            apply,
        }) => {
            let safety: SafetyLevel = safety.parse().map_err(anyhow::Error::msg)?;
            let options = RemovalOptions {
                force,
                cascade,
                remove_config_files: remove_config,
                remove_bundle_contents,
            };

            let catalog = load_catalog(&home, catalog_path)?;
            let mut tracker = open_tracker(&home)?;
            let (plan, report) = {
                let planner = RemovalPlanner::new(tracker.ledger(), &catalog, safety);
                let plan = planner.plan(&targets, &options);
                let report = planner.validate_plan(&plan);
                (plan, report)
            };

            if json {
                let output = PlanOutput {
                    plan: &plan,
                    validation: &report,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_plan(&plan, &report);
            }

            if apply {
                let applied = tracker.apply_removal(&plan)?;
                info!("Recorded removal plan (backup {})", applied.backup);
                println!(
                    "Recorded removal of {} installation(s); backup: {}",
                    applied.untracked.len(),
                    applied.backup
                );
            }
            Ok(())
        }
        Some(Commands::Expand { bundle, packages }) => {
            let catalog = load_catalog(&home, catalog_path)?;
            let items = match &packages {
                Some(manager) => catalog::expand_system_packages(&catalog, &bundle, manager)?,
                None => catalog::expand_tools(&catalog, &bundle)?,
            };
            for item in items {
                println!("{}", item);
            }
            Ok(())
        }
        Some(Commands::Backup { suffix }) => {
            let mut tracker = open_tracker(&home)?;
            let name = tracker.snapshot(suffix.as_deref())?;
            println!("Created backup {}", name);
            Ok(())
        }
        Some(Commands::Backups) => {
            let tracker = open_tracker(&home)?;
            let mut backups = tracker.list_backups()?;
            backups.sort();
            if backups.is_empty() {
                println!("No backups");
            }
            for name in backups {
                println!("{}", name);
            }
            Ok(())
        }
        Some(Commands::Restore { name }) => {
            let mut tracker = open_tracker(&home)?;
            tracker.restore(&name)?;
            println!(
                "Restored {} ({} installations)",
                name,
                tracker.get_all_installations().len()
            );
            Ok(())
        }
        None => {
            println!("Toolshed v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'toolshed --help' for usage information");
            Ok(())
        }
    }
}
