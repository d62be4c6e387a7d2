//! # cirrus-stack
//!
//! The weather service deployment: a resource group, a managed Redis cache,
//! a container registry, a multi-platform image pushed to it, and a public
//! container group running the image with the cache wired in.
//!
//! # Example
//!
//! ```rust,no_run
//! use cirrus_common::config::Config;
//!
//! let config = Config::from_file(std::path::Path::new("Cirrus.dev.yaml"), "weather")?;
//! let graph = cirrus_stack::build(&config)?;
//! # Ok::<(), cirrus_common::error::CirrusError>(())
//! ```

pub mod outputs;
pub mod resources;
pub mod settings;

use cirrus_common::config::Config;
use cirrus_common::error::Result;
use cirrus_engine::provider::simulated::REDIS;
use cirrus_engine::TimeoutPolicy;
use cirrus_graph::{CustomTimeouts, DeploymentGraph};

use crate::settings::StackSettings;

/// Project name used when the stack file does not declare one.
pub const PROJECT_NAME: &str = "weather";

/// Loads the settings and declares the whole graph.
///
/// Nothing is declared if any setting is missing or invalid.
///
/// # Errors
///
/// Returns an error if the settings fail to load or a declaration is rejected.
pub fn build(config: &Config) -> Result<DeploymentGraph> {
    let settings = StackSettings::load(config)?;
    declare(&settings)
}

/// Declares every node and export of the weather service.
///
/// # Errors
///
/// Returns an error if a declaration is rejected.
pub fn declare(settings: &StackSettings) -> Result<DeploymentGraph> {
    let mut graph = DeploymentGraph::new(&settings.project, &settings.stack);

    let group = resources::resource_group(&mut graph, settings)?;
    let cache = resources::cache(&mut graph, settings, &group)?;
    let registry = resources::registry(&mut graph, settings, &group)?;
    let image = resources::image(&mut graph, settings, &registry)?;
    let container_group =
        resources::container_group(&mut graph, settings, &group, &registry, &image, &cache)?;
    outputs::export_outputs(&mut graph, settings, &container_group)?;

    tracing::info!(
        nodes = graph.len(),
        exports = graph.exports().len(),
        "weather stack declared"
    );
    Ok(graph)
}

/// Timeout policy for the stack: the cache type gets its long timeouts.
#[must_use]
pub fn timeout_policy(settings: &StackSettings) -> TimeoutPolicy {
    TimeoutPolicy::default()
        .with_type_override(REDIS, CustomTimeouts::uniform(settings.cache_timeout))
}
