//! `cirrus graph`: print the dependency graph in Graphviz DOT format.

use clap::Args;

/// Arguments for the `graph` command.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Write the DOT text to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Executes the `graph` command.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete or the file cannot be written.
pub fn execute(config_path: &str, args: GraphArgs) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let graph = cirrus_stack::build(&config)?;
    let dot = graph.to_dot();
    match args.output {
        Some(path) => {
            std::fs::write(&path, dot)?;
            eprintln!("Wrote {} node(s) to {path}", graph.len());
        }
        None => print!("{dot}"),
    }
    Ok(())
}
