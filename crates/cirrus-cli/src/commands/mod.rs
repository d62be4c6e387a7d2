//! CLI command definitions and dispatch.

pub mod graph;
pub mod outputs;
pub mod preview;
pub mod up;

use std::path::Path;

use anyhow::Context;
use cirrus_common::config::Config;
use cirrus_common::constants::{DEFAULT_STACK_FILE, DEFAULT_STATE_FILE};
use clap::{Parser, Subcommand};

/// Cirrus: declare, preview and deploy the weather service stack.
#[derive(Parser, Debug)]
#[command(name = "cirrus", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the YAML stack configuration file.
    #[arg(long, global = true, env = "CIRRUS_STACK_FILE", default_value = DEFAULT_STACK_FILE)]
    pub config: String,

    /// Path to the state file.
    #[arg(long, global = true, default_value = DEFAULT_STATE_FILE)]
    pub state_file: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the ordered plan with declared inputs.
    Preview(preview::PreviewArgs),
    /// Deploy the stack and record its outputs.
    Up(up::UpArgs),
    /// Print the outputs of the last deployment.
    Outputs(outputs::OutputsArgs),
    /// Print the dependency graph in Graphviz DOT format.
    Graph(graph::GraphArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Preview(args) => preview::execute(&cli.config, args),
        Command::Up(args) => up::execute(&cli.config, &cli.state_file, args),
        Command::Outputs(args) => outputs::execute(&cli.state_file, args),
        Command::Graph(args) => graph::execute(&cli.config, args),
    }
}

/// Reads the stack file and applies `CIRRUS_CONFIG_*` overrides.
pub(crate) fn load_config(path: &str) -> anyhow::Result<Config> {
    let path = Path::new(path);
    if !path.exists() {
        anyhow::bail!(
            "Stack file not found: {}\n\
             Create one or pass a path: cirrus <command> --config <file>",
            path.display()
        );
    }
    let mut config = Config::from_file(path, cirrus_stack::PROJECT_NAME)
        .with_context(|| format!("failed to load {}", path.display()))?;
    config.apply_env_overrides(std::env::vars());
    Ok(config)
}
