//! Provider abstraction for the cloud the graph is evaluated against.

pub mod simulated;

use std::collections::BTreeMap;
use std::future::Future;

use cirrus_common::error::Result;
use cirrus_common::types::Urn;
use cirrus_common::value::Value;

pub use simulated::SimulatedProvider;

/// A resource whose inputs have all been resolved.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// URN of the declaration.
    pub urn: Urn,
    /// Provider type token.
    pub type_token: String,
    /// Logical name.
    pub name: String,
    /// Resolved inputs.
    pub inputs: BTreeMap<String, Value>,
}

/// A provider function call whose arguments have all been resolved.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// URN of the declaration.
    pub urn: Urn,
    /// Function token.
    pub function: String,
    /// Resolved arguments.
    pub args: BTreeMap<String, Value>,
}

/// A materialised resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    /// Provider-assigned identifier.
    pub id: String,
    /// Output properties, including the echoed inputs.
    pub outputs: BTreeMap<String, Value>,
}

/// Cloud provider the evaluator submits requests to.
///
/// Implementors perform the actual network calls. Errors must name the
/// URN of the request that failed.
pub trait Provider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Creates the resource described by `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects or fails the request.
    fn create(&self, request: &ResourceRequest) -> impl Future<Output = Result<Provisioned>> + Send;

    /// Calls a provider function.
    ///
    /// # Errors
    ///
    /// Returns an error if the function fails or its target does not exist.
    fn invoke(
        &self,
        request: &InvokeRequest,
    ) -> impl Future<Output = Result<BTreeMap<String, Value>>> + Send;
}
