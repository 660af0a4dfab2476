//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use nebula_graph::Direction;
use std::path::PathBuf;

/// Default project snapshot path
pub const DEFAULT_PROJECT: &str = "nebula-project.json";

/// Default configuration path
pub const DEFAULT_CONFIG: &str = "nebula.toml";

/// Build the `nebula` command
#[must_use]
pub fn build_cli() -> Command {
    Command::new("nebula")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Keep an architecture graph and its infrastructure code in step")
        .subcommand_required(true)
        .arg(
            Arg::new("project")
                .long("project")
                .short('p')
                .global(true)
                .default_value(DEFAULT_PROJECT)
                .value_parser(value_parser!(PathBuf))
                .help("Project snapshot to read and update"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value(DEFAULT_CONFIG)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("direction")
                .long("direction")
                .global(true)
                .value_parser(value_parser!(Direction))
                .help("Layout direction (TB, BT, LR, RL)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit structured JSON logs on stderr"),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate or extend the architecture from a description")
                .arg(
                    Arg::new("intent")
                        .required(true)
                        .num_args(1..)
                        .help("What to build, in plain words"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Derive the graph from a hand-edited code file")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Code file to import"),
                ),
        )
        .subcommand(Command::new("audit").about("Audit the current code and flag nodes"))
        .subcommand(
            Command::new("fix")
                .about("Repair the code for the current findings")
                .arg(
                    Arg::new("resync")
                        .long("resync")
                        .action(ArgAction::SetTrue)
                        .help("Regenerate the code from the graph instead"),
                ),
        )
        .subcommand(Command::new("sync").about("Bring the code in line with the graph"))
        .subcommand(Command::new("layout").about("Re-arrange every node"))
        .subcommand(Command::new("cost").about("Estimate the monthly cost"))
        .subcommand(Command::new("show").about("Print the current code document"))
}
