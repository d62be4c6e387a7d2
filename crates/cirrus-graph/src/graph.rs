//! Dependency graph management using `petgraph`.
//!
//! Builds a directed acyclic graph from consumer edges between declared
//! nodes and resolves the topological order used for evaluation.

use cirrus_common::error::{CirrusError, Result};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;

use crate::input::NodeId;

/// A dependency graph of declared nodes.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<NodeId, ()>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
        }
    }

    /// Adds a node to the graph.
    pub fn add_node(&mut self, id: NodeId) -> NodeIndex {
        self.graph.add_node(id)
    }

    /// Adds a dependency edge: `dependent` consumes an output of `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependency, dependent, ());
    }

    /// Returns a topological ordering of nodes for evaluation.
    ///
    /// Dependencies appear before the nodes that consume them.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn resolve_order(&self) -> Result<Vec<NodeId>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).copied())
                .collect()),
            Err(cycle) => {
                let at = self
                    .graph
                    .node_weight(cycle.node_id())
                    .map_or_else(String::new, |id| format!(" at node {id}"));
                Err(CirrusError::graph(format!(
                    "cyclic dependency detected in resource graph{at}"
                )))
            }
        }
    }

    /// Number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Renders the graph in Graphviz DOT format, labelling each node with `label`.
    pub fn to_dot<F>(&self, label: F) -> String
    where
        F: Fn(NodeId) -> String,
    {
        let labelled = self.graph.map(|_, id| label(*id), |_, _| "");
        format!("{}", Dot::with_config(&labelled, &[Config::EdgeNoLabel]))
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
