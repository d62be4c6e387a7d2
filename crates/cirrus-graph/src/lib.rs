//! # cirrus-graph
//!
//! Declarative layer of a deployment.
//!
//! Handles:
//! - **Input**: Literal values, references to other nodes' outputs, and interpolations.
//! - **Declaration**: Resource and query nodes with their options.
//! - **Graph**: Dependency graph construction and topological resolution.
//! - **Builder**: The [`DeploymentGraph`](builder::DeploymentGraph) nodes are declared into.
//! - **Validator**: Whole-graph checks run before evaluation.

pub mod builder;
pub mod declaration;
pub mod graph;
pub mod input;
pub mod validator;

pub use builder::{DeploymentGraph, ResourceHandle};
pub use declaration::{CustomTimeouts, Declaration, Export, NodeKind, ResourceOptions};
pub use input::{Input, NodeId, OutputRef, PropertyPath};
