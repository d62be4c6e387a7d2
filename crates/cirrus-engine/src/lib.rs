//! # cirrus-engine
//!
//! Evaluates a [`DeploymentGraph`](cirrus_graph::DeploymentGraph) against a
//! provider.
//!
//! Handles:
//! - **Engine**: Topological evaluation with output resolution between nodes.
//! - **Provider**: The seam to the cloud, plus a deterministic simulated cloud.
//! - **Timeout**: Per-operation, per-type and per-node timeout policy.
//! - **State**: The redacted deployment record written after a run.

pub mod engine;
pub mod provider;
pub mod state;
pub mod timeout;

pub use engine::{Deployment, Engine, NodeState, PlanStep};
pub use provider::{InvokeRequest, Provider, Provisioned, ResourceRequest};
pub use timeout::TimeoutPolicy;
