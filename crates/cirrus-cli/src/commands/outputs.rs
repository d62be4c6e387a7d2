//! `cirrus outputs`: print the exported outputs of the last deployment.

use std::path::Path;

use cirrus_engine::state::load_state;
use clap::Args;

use crate::output::{format_outputs, render_value};

/// Arguments for the `outputs` command.
#[derive(Args, Debug)]
pub struct OutputsArgs {
    /// Print a single output by name.
    pub name: Option<String>,

    /// Print as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `outputs` command.
///
/// # Errors
///
/// Returns an error if no deployment has been recorded or the named
/// output does not exist.
pub fn execute(state_file: &str, args: OutputsArgs) -> anyhow::Result<()> {
    let Some(state) = load_state(Path::new(state_file))? else {
        anyhow::bail!(
            "No deployment recorded at {state_file}\n\
             Run `cirrus up` first."
        );
    };

    if let Some(name) = args.name {
        let value = state
            .outputs
            .get(&name)
            .ok_or_else(|| anyhow::anyhow!("no output named '{name}' in {state_file}"))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", render_value(value));
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state.outputs)?);
    } else {
        println!("Outputs of {}/{} ({})", state.project, state.stack, state.updated_at);
        print!("{}", format_outputs(&state.outputs));
    }
    Ok(())
}
