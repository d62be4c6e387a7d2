//! Unified error types for the Cirrus workspace.
//!
//! Configuration errors are raised before any resource is declared,
//! graph errors at declaration time, and provider, build and timeout
//! errors while the graph is being evaluated.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CirrusError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration store itself is unusable.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required configuration key is absent.
    #[error("missing required configuration value '{key}'")]
    MissingConfig {
        /// Fully qualified key that was requested.
        key: String,
    },

    /// A configuration key is present but cannot be used as requested.
    #[error("configuration value '{key}' is invalid: {message}")]
    InvalidConfig {
        /// Fully qualified key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Container instances cannot remap ports.
    #[error(
        "containerPort ({container}) and publicPort ({public}) must be equal: \
         container groups do not support port mapping"
    )]
    PortMismatch {
        /// Port the container listens on.
        container: u16,
        /// Port published on the public IP.
        public: u16,
    },

    /// A resource declaration violates the graph invariants.
    #[error("invalid resource graph: {message}")]
    Graph {
        /// Description of the violation.
        message: String,
    },

    /// A referenced item was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing item.
        kind: &'static str,
        /// Identifier of the missing item.
        id: String,
    },

    /// An output reference does not resolve to a value.
    #[error("output '{path}' of {node} is not available")]
    UnknownOutput {
        /// URN of the node being referenced.
        node: String,
        /// Property path that failed to resolve.
        path: String,
    },

    /// A node's inputs could not be resolved before calling the provider.
    #[error("cannot resolve inputs of {resource}: {source}")]
    Input {
        /// URN of the node whose inputs failed.
        resource: String,
        /// Underlying resolution failure.
        source: Box<CirrusError>,
    },

    /// The provider rejected or failed an operation.
    #[error("provider error on {resource}: {message}")]
    Provider {
        /// URN of the failing resource.
        resource: String,
        /// Provider-reported failure.
        message: String,
    },

    /// An image build or push failed.
    #[error("image build failed for {resource}: {message}")]
    Build {
        /// URN of the image resource.
        resource: String,
        /// Build failure description.
        message: String,
    },

    /// An operation exceeded its timeout.
    #[error("{operation} of {resource} timed out after {after:?}")]
    Timeout {
        /// URN of the resource.
        resource: String,
        /// Operation that timed out.
        operation: &'static str,
        /// Effective timeout.
        after: Duration,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CirrusError {
    /// Shorthand for a [`CirrusError::Graph`] error.
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            message: message.into(),
        }
    }

    /// Shorthand for a [`CirrusError::Provider`] error.
    pub fn provider(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CirrusError>;
