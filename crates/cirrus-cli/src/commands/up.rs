//! `cirrus up`: deploy the stack and record its outputs.

use std::path::Path;
use std::time::Instant;

use cirrus_engine::provider::SimulatedProvider;
use cirrus_engine::state::{StateFile, save_state};
use cirrus_engine::timeout::parse_duration;
use cirrus_engine::{Deployment, Engine};
use cirrus_stack::settings::StackSettings;
use clap::Args;

use crate::output::{BOLD, DIM, GREEN, RESET, format_duration, format_outputs, print_header};

/// Arguments for the `up` command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Region for resources that do not name one.
    #[arg(long, default_value = "westus3")]
    pub location: String,

    /// Simulated provisioning latency per request (e.g. "250ms", "2s").
    #[arg(long)]
    pub latency: Option<String>,

    /// Time limit for each secondary query (e.g. "2m").
    #[arg(long)]
    pub invoke_timeout: Option<String>,
}

/// Executes the `up` command.
///
/// Declares the graph, evaluates it node by node, prints the exported
/// outputs and writes the redacted state file.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete, a node fails or
/// times out, or the state file cannot be written.
pub fn execute(config_path: &str, state_file: &str, args: UpArgs) -> anyhow::Result<()> {
    let started = Instant::now();
    print_header("up");

    let config = super::load_config(config_path)?;
    let settings = StackSettings::load(&config)?;
    let graph = cirrus_stack::declare(&settings)?;

    let mut provider = SimulatedProvider::new().with_location(args.location);
    if let Some(latency) = args.latency.as_deref() {
        provider = provider.with_latency(parse_duration(latency)?);
    }
    let mut policy = cirrus_stack::timeout_policy(&settings);
    if let Some(timeout) = args.invoke_timeout.as_deref() {
        policy = policy.with_invoke_timeout(parse_duration(timeout)?);
    }
    let engine = Engine::new(provider).with_policy(policy);

    eprintln!(
        "  Deploying {}/{}: {} node(s)",
        graph.project(),
        graph.stack(),
        graph.len()
    );
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let deployment = runtime.block_on(engine.deploy(&graph))?;
    report_nodes(&deployment);

    let state = StateFile::from_deployment(&deployment);
    save_state(Path::new(state_file), &state)?;

    eprintln!();
    eprintln!(
        "  {GREEN}Deployed{RESET} in {} {DIM}(deployment {}, state {state_file}){RESET}",
        format_duration(started.elapsed()),
        deployment.id
    );
    println!();
    println!("Outputs:");
    print!("{}", format_outputs(&state.outputs));
    Ok(())
}

fn report_nodes(deployment: &Deployment) {
    eprintln!();
    for node in &deployment.nodes {
        eprintln!(
            "  {GREEN}\u{2713}{RESET} {BOLD}{}{RESET} {DIM}{}{RESET}",
            node.urn.name(),
            node.type_token
        );
    }
}
