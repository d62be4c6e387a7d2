//! Graph evaluator that materialises declared nodes through a provider.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cirrus_common::error::{CirrusError, Result};
use cirrus_common::secret::Secret;
use cirrus_common::types::{DeploymentId, Operation, Urn};
use cirrus_common::value::Value;
use cirrus_graph::validator::validate;
use cirrus_graph::{Declaration, DeploymentGraph, NodeId, NodeKind, OutputRef};

use crate::provider::{InvokeRequest, Provider, ResourceRequest};
use crate::timeout::TimeoutPolicy;

/// A materialised node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    /// URN of the declaration.
    pub urn: Urn,
    /// Provider type or function token.
    pub type_token: String,
    /// Resource or query.
    pub kind: NodeKind,
    /// Provider-assigned ID; queries have none.
    pub id: Option<String>,
    /// Resolved outputs.
    pub outputs: BTreeMap<String, Value>,
}

/// Result of evaluating a whole graph.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Unique ID of this run.
    pub id: DeploymentId,
    /// Project name.
    pub project: String,
    /// Stack name.
    pub stack: String,
    /// Nodes in the order they were materialised.
    pub nodes: Vec<NodeState>,
    /// Resolved exported values.
    pub exports: BTreeMap<String, Value>,
    /// When evaluation started.
    pub started_at: DateTime<Utc>,
    /// When evaluation finished.
    pub finished_at: DateTime<Utc>,
}

impl Deployment {
    /// Looks up a materialised node by logical name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeState> {
        self.nodes.iter().find(|n| n.urn.name() == name)
    }
}

/// One entry of a preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// URN of the declaration.
    pub urn: Urn,
    /// Provider type or function token.
    pub type_token: String,
    /// Resource or query.
    pub kind: NodeKind,
    /// Declared inputs, references shown symbolically and secrets redacted.
    pub inputs: serde_json::Value,
    /// Logical names of the nodes this one consumes.
    pub depends_on: Vec<String>,
    /// Effective create (or invoke) timeout.
    pub timeout: Duration,
}

/// The engine that evaluates deployment graphs.
///
/// Nodes are materialised in topological order; each node's inputs are
/// resolved against the outputs of the nodes already materialised.
#[derive(Debug)]
pub struct Engine<P> {
    provider: P,
    policy: TimeoutPolicy,
}

impl<P: Provider> Engine<P> {
    /// Creates an engine with the default timeout policy.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            policy: TimeoutPolicy::default(),
        }
    }

    /// Replaces the timeout policy.
    #[must_use]
    pub fn with_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the ordered plan without contacting the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph fails validation.
    pub fn preview(&self, graph: &DeploymentGraph) -> Result<Vec<PlanStep>> {
        validate(graph)?;
        let order = graph.resolve_order()?;
        let name_of = |id: NodeId| graph.name_of(id);

        let steps = order
            .into_iter()
            .filter_map(|id| graph.declaration(id))
            .map(|decl| PlanStep {
                urn: decl.urn.clone(),
                type_token: decl.type_token.clone(),
                kind: decl.kind,
                inputs: serde_json::Value::Object(
                    decl.inputs
                        .iter()
                        .map(|(k, v)| (k.clone(), v.render(&name_of)))
                        .collect(),
                ),
                depends_on: decl.dependencies().into_iter().map(name_of).collect(),
                timeout: self.effective_timeout(decl),
            })
            .collect();
        Ok(steps)
    }

    fn effective_timeout(&self, decl: &Declaration) -> Duration {
        match decl.kind {
            NodeKind::Resource => self.policy.timeout_for(decl, Operation::Create),
            NodeKind::Invoke => self.policy.invoke_timeout(),
        }
    }

    /// Evaluates the graph, materialising every node through the provider.
    ///
    /// The first failing node aborts the run.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, an input does not resolve,
    /// the provider fails, or an operation exceeds its timeout.
    pub async fn deploy(&self, graph: &DeploymentGraph) -> Result<Deployment> {
        validate(graph)?;
        let started_at = Utc::now();
        let id = DeploymentId::generate();
        let order = graph.resolve_order()?;
        tracing::info!(
            deployment = %id,
            provider = self.provider.name(),
            nodes = order.len(),
            "deployment started"
        );

        let mut resolved: HashMap<NodeId, Value> = HashMap::new();
        let mut nodes = Vec::with_capacity(order.len());
        for node in order {
            let Some(decl) = graph.declaration(node) else {
                continue;
            };
            let state = self.materialise(graph, decl, &resolved).await?;
            let _ = resolved.insert(node, Value::Object(state.outputs.clone()));
            nodes.push(state);
        }

        let lookup = |r: &OutputRef| lookup_output(graph, &resolved, r);
        let mut exports = BTreeMap::new();
        for export in graph.exports() {
            let value = export.value.resolve(&lookup)?;
            let _ = exports.insert(export.name.clone(), value);
        }

        tracing::info!(deployment = %id, exports = exports.len(), "deployment finished");
        Ok(Deployment {
            id,
            project: graph.project().to_owned(),
            stack: graph.stack().to_owned(),
            nodes,
            exports,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn materialise(
        &self,
        graph: &DeploymentGraph,
        decl: &Declaration,
        resolved: &HashMap<NodeId, Value>,
    ) -> Result<NodeState> {
        let lookup = |r: &OutputRef| lookup_output(graph, resolved, r);
        let inputs = decl
            .inputs
            .iter()
            .map(|(k, v)| v.resolve(&lookup).map(|value| (k.clone(), value)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map_err(|source| CirrusError::Input {
                resource: decl.urn.to_string(),
                source: Box::new(source),
            })?;
        tracing::debug!(urn = %decl.urn, inputs = inputs.len(), "inputs resolved");

        let timeout = self.effective_timeout(decl);
        let (id, mut outputs) = match decl.kind {
            NodeKind::Resource => {
                let request = ResourceRequest {
                    urn: decl.urn.clone(),
                    type_token: decl.type_token.clone(),
                    name: decl.name.clone(),
                    inputs,
                };
                let provisioned = tokio::time::timeout(timeout, self.provider.create(&request))
                    .await
                    .map_err(|_| timed_out(decl, Operation::Create.as_str(), timeout))??;
                (Some(provisioned.id), provisioned.outputs)
            }
            NodeKind::Invoke => {
                let request = InvokeRequest {
                    urn: decl.urn.clone(),
                    function: decl.type_token.clone(),
                    args: inputs,
                };
                let outputs = tokio::time::timeout(timeout, self.provider.invoke(&request))
                    .await
                    .map_err(|_| timed_out(decl, "invoke", timeout))??;
                (None, outputs)
            }
        };
        mark_secret_outputs(&mut outputs, &decl.options.additional_secret_outputs);
        tracing::info!(urn = %decl.urn, kind = ?decl.kind, "node materialised");

        Ok(NodeState {
            urn: decl.urn.clone(),
            type_token: decl.type_token.clone(),
            kind: decl.kind,
            id,
            outputs,
        })
    }
}

fn timed_out(decl: &Declaration, operation: &'static str, after: Duration) -> CirrusError {
    tracing::warn!(urn = %decl.urn, operation, ?after, "operation timed out");
    CirrusError::Timeout {
        resource: decl.urn.to_string(),
        operation,
        after,
    }
}

fn lookup_output(
    graph: &DeploymentGraph,
    resolved: &HashMap<NodeId, Value>,
    r: &OutputRef,
) -> Result<Value> {
    resolved
        .get(&r.node)
        .and_then(|outputs| r.path.lookup(outputs))
        .cloned()
        .ok_or_else(|| CirrusError::UnknownOutput {
            node: graph
                .declaration(r.node)
                .map_or_else(|| r.node.to_string(), |d| d.urn.to_string()),
            path: r.path.to_string(),
        })
}

fn mark_secret_outputs(outputs: &mut BTreeMap<String, Value>, keys: &[String]) {
    for key in keys {
        if let Some(value) = outputs.get_mut(key) {
            if let Some((text, _)) = value.interpolation_text() {
                *value = Value::Secret(Secret::new(text));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cirrus_graph::{Input, ResourceOptions};

    use super::*;
    use crate::provider::simulated::{LIST_REDIS_KEYS, REDIS, RESOURCE_GROUP};
    use crate::provider::SimulatedProvider;

    fn graph() -> DeploymentGraph {
        let mut graph = DeploymentGraph::new("weather", "dev");
        let rg = graph
            .register_resource(
                RESOURCE_GROUP,
                "demo-rg",
                Vec::<(String, Input)>::new(),
                ResourceOptions::default(),
            )
            .expect("rg");
        let redis = graph
            .register_resource(
                REDIS,
                "demo-redis",
                [
                    ("name", Input::from("demo-weather-cache")),
                    ("resourceGroupName", rg.get("name")),
                ],
                ResourceOptions {
                    additional_secret_outputs: vec!["hostName".into()],
                    ..ResourceOptions::default()
                },
            )
            .expect("redis");
        let keys = graph
            .invoke(
                LIST_REDIS_KEYS,
                "demo-redis-keys",
                [("name", redis.get("name")), ("resourceGroupName", rg.get("name"))],
            )
            .expect("keys");
        graph
            .export(
                "url",
                Input::interpolate([
                    Input::from("rediss://:"),
                    keys.get("primaryKey"),
                    Input::from("@"),
                    redis.get("name"),
                ]),
            )
            .expect("export");
        graph.export("group", rg.get("name")).expect("export");
        graph
    }

    #[tokio::test]
    async fn deploy_materialises_in_dependency_order() {
        let engine = Engine::new(SimulatedProvider::new());
        let deployment = engine.deploy(&graph()).await.expect("deploy");

        let names: Vec<_> = deployment.nodes.iter().map(|n| n.urn.name().to_owned()).collect();
        assert_eq!(names, vec!["demo-rg", "demo-redis", "demo-redis-keys"]);
        assert!(deployment.node("demo-rg").and_then(|n| n.id.as_ref()).is_some());
        assert!(deployment.node("demo-redis-keys").is_some_and(|n| n.id.is_none()));
        assert!(deployment.exports["url"].is_secret());
        assert!(
            deployment.exports["group"]
                .as_str()
                .is_some_and(|g| g.starts_with("demo-rg"))
        );
    }

    #[tokio::test]
    async fn additional_secret_outputs_are_wrapped() {
        let engine = Engine::new(SimulatedProvider::new());
        let deployment = engine.deploy(&graph()).await.expect("deploy");
        let redis = deployment.node("demo-redis").expect("redis");
        assert!(redis.outputs["hostName"].is_secret());
    }

    #[tokio::test]
    async fn provider_failure_aborts_and_names_the_node() {
        let engine =
            Engine::new(SimulatedProvider::new().fail_on("demo-redis", "name already taken"));
        let err = engine.deploy(&graph()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("demo-redis"), "got: {msg}");
        assert!(msg.contains("name already taken"), "got: {msg}");
    }

    #[tokio::test]
    async fn slow_operations_time_out() {
        let engine = Engine::new(SimulatedProvider::new().with_latency(Duration::from_millis(200)))
            .with_policy(TimeoutPolicy::new(Duration::from_millis(10)));
        let err = engine.deploy(&graph()).await.unwrap_err();
        assert!(matches!(err, CirrusError::Timeout { operation: "create", .. }), "got: {err}");
    }

    #[tokio::test]
    async fn type_override_applies_to_that_type_only() {
        let policy = TimeoutPolicy::new(Duration::from_secs(5)).with_type_override(
            REDIS,
            cirrus_graph::CustomTimeouts::uniform(Duration::from_millis(1)),
        );
        let engine = Engine::new(SimulatedProvider::new().with_latency(Duration::from_millis(50)))
            .with_policy(policy);
        let err = engine.deploy(&graph()).await.unwrap_err();
        assert!(err.to_string().contains("demo-redis"), "got: {err}");
    }

    #[test]
    fn preview_renders_references_without_provider_calls() {
        let engine =
            Engine::new(SimulatedProvider::new().fail_on(RESOURCE_GROUP, "must not be called"));
        let plan = engine.preview(&graph()).expect("preview");
        assert_eq!(plan.len(), 3);
        let redis = &plan[1];
        assert_eq!(redis.urn.name(), "demo-redis");
        assert_eq!(redis.inputs["resourceGroupName"], serde_json::json!("${demo-rg.name}"));
        assert_eq!(redis.depends_on, vec!["demo-rg".to_owned()]);
        assert_eq!(plan[2].timeout, crate::timeout::DEFAULT_INVOKE_TIMEOUT);
    }

    #[tokio::test]
    async fn unresolvable_reference_is_reported() {
        let mut graph = DeploymentGraph::new("weather", "dev");
        let rg = graph
            .register_resource(
                RESOURCE_GROUP,
                "demo-rg",
                Vec::<(String, Input)>::new(),
                ResourceOptions::default(),
            )
            .expect("rg");
        graph.export("missing", rg.get("doesNotExist")).expect("export");
        let err = Engine::new(SimulatedProvider::new()).deploy(&graph).await.unwrap_err();
        assert!(matches!(err, CirrusError::UnknownOutput { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn input_failures_name_the_consuming_node() {
        let mut graph = DeploymentGraph::new("weather", "dev");
        let rg = graph
            .register_resource(
                RESOURCE_GROUP,
                "demo-rg",
                Vec::<(String, Input)>::new(),
                ResourceOptions::default(),
            )
            .expect("rg");
        let _ = graph
            .register_resource(
                REDIS,
                "demo-redis",
                [("name", Input::interpolate([rg.get("nope")]))],
                ResourceOptions::default(),
            )
            .expect("redis");
        let err = Engine::new(SimulatedProvider::new()).deploy(&graph).await.unwrap_err();
        assert!(
            matches!(
                err,
                CirrusError::Input { ref resource, .. } if resource.ends_with("::demo-redis")
            ),
            "got: {err}"
        );
        assert!(err.to_string().contains("nope"), "got: {err}");
    }

    #[tokio::test]
    async fn non_scalar_interpolation_names_the_consuming_node() {
        let mut graph = DeploymentGraph::new("weather", "dev");
        let rg = graph
            .register_resource(
                RESOURCE_GROUP,
                "demo-rg",
                Vec::<(String, Input)>::new(),
                ResourceOptions::default(),
            )
            .expect("rg");
        let _ = graph
            .register_resource(
                REDIS,
                "demo-redis",
                [
                    ("resourceGroupName", rg.get("name")),
                    (
                        "name",
                        Input::interpolate([Input::from("x-"), Input::list([rg.get("name")])]),
                    ),
                ],
                ResourceOptions::default(),
            )
            .expect("redis");
        let err = Engine::new(SimulatedProvider::new()).deploy(&graph).await.unwrap_err();
        assert!(err.to_string().contains("demo-redis"), "got: {err}");
    }
}
