//! `cirrus preview`: display the ordered plan before deploying.

use cirrus_engine::provider::SimulatedProvider;
use cirrus_engine::Engine;
use cirrus_graph::NodeKind;
use cirrus_stack::settings::StackSettings;
use clap::Args;

use crate::output::{BOLD, CYAN, DIM, RESET, format_duration};

/// Arguments for the `preview` command.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Hide the declared inputs of each node.
    #[arg(long)]
    pub compact: bool,
}

/// Executes the `preview` command.
///
/// Loads the settings, declares the graph and prints every node in
/// evaluation order. Nothing is created.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete or the graph is invalid.
pub fn execute(config_path: &str, args: PreviewArgs) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let settings = StackSettings::load(&config)?;
    let graph = cirrus_stack::declare(&settings)?;
    let engine = Engine::new(SimulatedProvider::new())
        .with_policy(cirrus_stack::timeout_policy(&settings));
    let plan = engine.preview(&graph)?;

    println!("Preview of {}/{} ({config_path})", graph.project(), graph.stack());
    println!();
    for step in &plan {
        let (marker, verb) = match step.kind {
            NodeKind::Resource => ("+", "create"),
            NodeKind::Invoke => ("?", "read"),
        };
        println!(
            "  {BOLD}{marker} {}{RESET}  {CYAN}{}{RESET}  {DIM}{verb}, timeout {}{RESET}",
            step.urn.name(),
            step.type_token,
            format_duration(step.timeout)
        );
        if !step.depends_on.is_empty() {
            println!("      after: {}", step.depends_on.join(", "));
        }
        if !args.compact {
            let inputs = serde_json::to_string_pretty(&step.inputs)?;
            for line in inputs.lines() {
                println!("      {line}");
            }
        }
    }

    let resources = plan.iter().filter(|s| s.kind == NodeKind::Resource).count();
    println!();
    println!(
        "  {resources} resource(s) to create, {} read(s), {} output(s).",
        plan.len() - resources,
        graph.exports().len()
    );
    Ok(())
}
