//! The deployment graph nodes are declared into.
//!
//! A node may only consume outputs of nodes declared before it. Forward
//! references are rejected at declaration time, so a graph built here is
//! acyclic by construction; [`DeploymentGraph::resolve_order`] still runs a
//! full topological sort before evaluation.

use std::collections::{BTreeMap, HashMap};

use cirrus_common::error::{CirrusError, Result};
use cirrus_common::types::Urn;
use petgraph::graph::NodeIndex;

use crate::declaration::{Declaration, Export, NodeKind, ResourceOptions};
use crate::graph::DependencyGraph;
use crate::input::{Input, NodeId, OutputRef, PropertyPath};

/// Handle to a declared node, used to reference its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    id: NodeId,
    urn: Urn,
}

impl ResourceHandle {
    /// Node ID of the declaration.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// URN of the declaration.
    #[must_use]
    pub const fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Reference to a top-level output property.
    #[must_use]
    pub fn get(&self, key: &str) -> Input {
        Input::Output(OutputRef {
            node: self.id,
            path: PropertyPath::key(key),
        })
    }

    /// Reference to a nested output property, e.g. `ipAddress.fqdn`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is malformed.
    pub fn output(&self, path: &str) -> Result<Input> {
        Ok(Input::Output(OutputRef {
            node: self.id,
            path: PropertyPath::parse(path)?,
        }))
    }
}

/// Declared nodes, their dependency edges, and exported values.
#[derive(Debug)]
pub struct DeploymentGraph {
    project: String,
    stack: String,
    declarations: Vec<Declaration>,
    exports: Vec<Export>,
    graph: DependencyGraph,
    indices: Vec<NodeIndex>,
    by_name: HashMap<String, NodeId>,
}

impl DeploymentGraph {
    /// Creates an empty graph for a project's stack.
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            declarations: Vec::new(),
            exports: Vec::new(),
            graph: DependencyGraph::new(),
            indices: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declares a managed resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or an input references a node
    /// that has not been declared yet.
    pub fn register_resource<K, I>(
        &mut self,
        type_token: &str,
        name: &str,
        inputs: I,
        options: ResourceOptions,
    ) -> Result<ResourceHandle>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Input)>,
    {
        self.declare(NodeKind::Resource, type_token, name, inputs, options)
    }

    /// Declares a provider function call whose result other nodes consume.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or an argument references a
    /// node that has not been declared yet.
    pub fn invoke<K, I>(&mut self, function: &str, name: &str, args: I) -> Result<ResourceHandle>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Input)>,
    {
        self.declare(
            NodeKind::Invoke,
            function,
            name,
            args,
            ResourceOptions::default(),
        )
    }

    fn declare<K, I>(
        &mut self,
        kind: NodeKind,
        type_token: &str,
        name: &str,
        inputs: I,
        options: ResourceOptions,
    ) -> Result<ResourceHandle>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Input)>,
    {
        if name.is_empty() {
            return Err(CirrusError::graph(format!(
                "{type_token} declared without a name"
            )));
        }
        if self.by_name.contains_key(name) {
            return Err(CirrusError::graph(format!("duplicate node name: \"{name}\"")));
        }

        let id = NodeId::new(self.declarations.len());
        let declaration = Declaration {
            id,
            kind,
            type_token: type_token.to_owned(),
            name: name.to_owned(),
            urn: Urn::new(&self.stack, &self.project, type_token, name),
            inputs: inputs.into_iter().map(|(k, v)| (k.into(), v)).collect::<BTreeMap<_, _>>(),
            options,
        };

        let dependencies = declaration.dependencies();
        for dep in &dependencies {
            if dep.index() >= self.declarations.len() {
                return Err(CirrusError::graph(format!(
                    "\"{name}\" references node {dep}, which is not declared before it"
                )));
            }
        }

        let index = self.graph.add_node(id);
        for dep in &dependencies {
            self.graph.add_dependency(index, self.indices[dep.index()]);
        }
        tracing::debug!(
            urn = %declaration.urn,
            dependencies = dependencies.len(),
            "node declared"
        );

        let handle = ResourceHandle {
            id,
            urn: declaration.urn.clone(),
        };
        self.indices.push(index);
        let _ = self.by_name.insert(name.to_owned(), id);
        self.declarations.push(declaration);
        Ok(handle)
    }

    /// Exports a value from the deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the export name is taken or the value references
    /// an undeclared node.
    pub fn export(&mut self, name: &str, value: Input) -> Result<()> {
        if self.exports.iter().any(|e| e.name == name) {
            return Err(CirrusError::graph(format!("duplicate export: \"{name}\"")));
        }
        if let Some(dep) = value
            .dependencies()
            .into_iter()
            .find(|d| d.index() >= self.declarations.len())
        {
            return Err(CirrusError::graph(format!(
                "export \"{name}\" references undeclared node {dep}"
            )));
        }
        self.exports.push(Export {
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    /// Project name.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Stack name.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// All declarations in declaration order.
    #[must_use]
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Looks up a declaration by node ID.
    #[must_use]
    pub fn declaration(&self, id: NodeId) -> Option<&Declaration> {
        self.declarations.get(id.index())
    }

    /// Looks up a declaration by logical name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Declaration> {
        self.by_name.get(name).and_then(|id| self.declaration(*id))
    }

    /// Exported values in export order.
    #[must_use]
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Number of declared nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Returns true if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Returns the evaluation order: every node after the nodes it consumes.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains a cycle.
    pub fn resolve_order(&self) -> Result<Vec<NodeId>> {
        let order = self.graph.resolve_order()?;
        tracing::debug!(nodes = order.len(), "evaluation order resolved");
        Ok(order)
    }

    /// Logical name of a node, or its ID if unknown.
    #[must_use]
    pub fn name_of(&self, id: NodeId) -> String {
        self.declaration(id)
            .map_or_else(|| id.to_string(), |d| d.name.clone())
    }

    /// Renders the dependency graph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        self.graph.to_dot(|id| {
            self.declaration(id).map_or_else(
                || id.to_string(),
                |d| format!("{}\n{}", d.name, d.type_token),
            )
        })
    }
}
