//! Resource and query declarations.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use cirrus_common::types::{Operation, Urn};

use crate::input::{Input, NodeId};

/// What a node asks the provider to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A managed resource with a lifecycle.
    Resource,
    /// A read-only provider function (key listing, credential listing).
    Invoke,
}

/// Per-node overrides of operation timeouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomTimeouts {
    /// Timeout for creation.
    pub create: Option<Duration>,
    /// Timeout for in-place updates.
    pub update: Option<Duration>,
    /// Timeout for deletion.
    pub delete: Option<Duration>,
}

impl CustomTimeouts {
    /// Same timeout for every operation.
    #[must_use]
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            create: Some(timeout),
            update: Some(timeout),
            delete: Some(timeout),
        }
    }

    /// Override for one operation, if set.
    #[must_use]
    pub const fn get(&self, operation: Operation) -> Option<Duration> {
        match operation {
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Options that shape how a node is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Timeout overrides for this node only.
    pub custom_timeouts: Option<CustomTimeouts>,
    /// Output properties to treat as secret even if the provider returns them plain.
    pub additional_secret_outputs: Vec<String>,
    /// Explicit dependencies not expressed through inputs.
    pub depends_on: Vec<NodeId>,
}

/// A declared node.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Position in declaration order.
    pub id: NodeId,
    /// Resource or query.
    pub kind: NodeKind,
    /// Provider type token, e.g. `azure-native:redis:Redis`.
    pub type_token: String,
    /// Unique logical name.
    pub name: String,
    /// Unique resource name.
    pub urn: Urn,
    /// Desired-state attributes.
    pub inputs: BTreeMap<String, Input>,
    /// Evaluation options.
    pub options: ResourceOptions,
}

impl Declaration {
    /// Every node this declaration consumes outputs of, plus explicit dependencies.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<NodeId> {
        let mut deps: BTreeSet<NodeId> = self.options.depends_on.iter().copied().collect();
        for input in self.inputs.values() {
            deps.extend(input.dependencies());
        }
        deps
    }
}

/// A value exported from the deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    /// Output name.
    pub name: String,
    /// Expression producing the value.
    pub value: Input,
}
