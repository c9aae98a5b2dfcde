// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn name_arg(help: &'static str) -> Arg {
    Arg::new("name").required(true).help(help)
}

fn flag(long: &'static str, help: &'static str) -> Arg {
    Arg::new(long)
        .long(long)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("toolshed")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Toolshed Contributors")
        .about("Installation ledger and safe-removal planner for developer tools")
        .subcommand_required(false)
        .arg(
            Arg::new("home")
                .long("home")
                .value_name("DIR")
                .global(true)
                .help("Toolshed home directory (default: $TOOLSHED_HOME or ~/.toolshed)"),
        )
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .value_name("FILE")
                .global(true)
                .help("Tool and bundle catalog (default: <home>/catalog.toml if present)"),
        )
        .subcommand(Command::new("init").about("Create the ledger if it does not exist"))
        .subcommand(Command::new("list").about("List tracked installations"))
        .subcommand(Command::new("stats").about("Show installation statistics"))
        .subcommand(
            Command::new("track")
                .about("Record an installed tool")
                .arg(name_arg("Tool name"))
                .arg(
                    Arg::new("method")
                        .short('m')
                        .long("method")
                        .default_value("source_build")
                        .help("Install method"),
                )
                .arg(Arg::new("tool_version").long("tool-version").help("Installed version"))
                .arg(
                    Arg::new("dep")
                        .short('d')
                        .long("dep")
                        .action(ArgAction::Append)
                        .help("Shared dependency this tool uses"),
                )
                .arg(
                    Arg::new("bin")
                        .short('b')
                        .long("bin")
                        .action(ArgAction::Append)
                        .help("Installed binary path"),
                )
                .arg(Arg::new("build_dir").long("build-dir").help("Build directory"))
                .arg(Arg::new("source").long("source").help("Source repository or download URL"))
                .arg(
                    Arg::new("config_file")
                        .long("config-file")
                        .action(ArgAction::Append)
                        .help("Config file owned by the tool"),
                )
                .arg(
                    Arg::new("system_package")
                        .long("system-package")
                        .action(ArgAction::Append)
                        .help("System package installed for the tool"),
                )
                .arg(Arg::new("bundle").long("bundle").help("Bundle that installed this tool"))
                .arg(
                    Arg::new("context")
                        .long("context")
                        .action(ArgAction::Append)
                        .help("Context tag"),
                )
                .arg(flag("as-dependency", "Installed as a dependency")),
        )
        .subcommand(
            Command::new("track-bundle")
                .about("Record an installed bundle")
                .arg(name_arg("Bundle name"))
                .arg(
                    Arg::new("tool")
                        .short('t')
                        .long("tool")
                        .action(ArgAction::Append)
                        .help("Member tool (default: expand from the catalog)"),
                )
                .arg(flag("as-dependency", "Not installed at the user's request")),
        )
        .subcommand(
            Command::new("track-dependency")
                .about("Record a shared dependency or refresh its metadata")
                .arg(name_arg("Dependency name"))
                .arg(
                    Arg::new("installer")
                        .short('i')
                        .long("installer")
                        .required(true)
                        .help("Installer that manages it"),
                )
                .arg(Arg::new("tool_version").long("tool-version").help("Installed version"))
                .arg(Arg::new("path").long("path").help("Install location"))
                .arg(flag("pre-existing", "It was on the system before toolshed")),
        )
        .subcommand(
            Command::new("adopt")
                .about("Detect a tool already on PATH and record it as pre-existing")
                .arg(name_arg("Tool name"))
                .arg(Arg::new("binary").short('b').long("binary").help("Binary to look for"))
                .arg(Arg::new("tool_version").long("tool-version").help("Installed version")),
        )
        .subcommand(
            Command::new("untrack")
                .about("Stop tracking an installation")
                .arg(name_arg("Installation name")),
        )
        .subcommand(
            Command::new("dependents")
                .about("Show the dependents of a shared dependency")
                .arg(name_arg("Dependency name")),
        )
        .subcommand(
            Command::new("check")
                .about("Check whether an installation can be removed safely")
                .arg(name_arg("Installation name")),
        )
        .subcommand(
            Command::new("cleanup")
                .about("List dependencies with no dependents, optionally dropping them")
                .arg(flag("apply", "Drop the cleanup candidates from the ledger")),
        )
        .subcommand(
            Command::new("plan")
                .about("Build a removal plan")
                .arg(
                    Arg::new("targets")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Tools or bundles to remove"),
                )
                .arg(
                    flag(
                        "force",
                        "Remove tools even if other installations depend on them",
                    )
                    .short('f'),
                )
                .arg(
                    flag(
                        "cascade",
                        "Remove shared dependencies left without dependents",
                    )
                    .short('c'),
                )
                .arg(flag("remove-config", "Include tracked config files"))
                .arg(flag(
                    "remove-bundle-contents",
                    "Also remove the member tools of removed bundles",
                ))
                .arg(
                    Arg::new("safety")
                        .short('s')
                        .long("safety")
                        .default_value("standard")
                        .help("Validation safety level (conservative, standard, aggressive)"),
                )
                .arg(flag("json", "Print the plan as JSON"))
                .arg(flag("apply", "Record the plan in the ledger after the files were removed")),
        )
        .subcommand(
            Command::new("expand")
                .about("Expand a catalog bundle")
                .arg(Arg::new("bundle").required(true).help("Bundle name"))
                .arg(
                    Arg::new("packages")
                        .long("packages")
                        .value_name("MANAGER")
                        .help("Expand system packages for this package manager instead of tools"),
                ),
        )
        .subcommand(
            Command::new("backup")
                .about("Back up the ledger")
                .arg(
                    Arg::new("suffix")
                        .short('s')
                        .long("suffix")
                        .help("Suffix appended to the backup name"),
                ),
        )
        .subcommand(Command::new("backups").about("List ledger backups"))
        .subcommand(
            Command::new("restore")
                .about("Restore the ledger from a backup")
                .arg(name_arg("Backup file name")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("toolshed.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
