//! Whole-graph validation run before evaluation.
//!
//! Checks for duplicate names, references that do not point strictly
//! backwards in declaration order, dangling exports, and cycles.

use std::collections::HashSet;

use cirrus_common::error::{CirrusError, Result};

use crate::builder::DeploymentGraph;
use crate::declaration::{Declaration, Export};

/// Validates a deployment graph for semantic correctness.
///
/// # Checks performed
///
/// 1. No duplicate node names.
/// 2. Every node consumes only outputs of nodes declared before it.
/// 3. Every export references declared nodes only.
/// 4. The dependency graph has a topological order.
///
/// # Errors
///
/// Returns an error if any check fails.
pub fn validate(graph: &DeploymentGraph) -> Result<()> {
    tracing::info!(nodes = graph.len(), "validating resource graph");
    check_duplicate_names(graph.declarations())?;
    check_backward_references(graph.declarations())?;
    check_exports(graph.declarations(), graph.exports())?;
    let _ = graph.resolve_order()?;
    Ok(())
}

fn check_duplicate_names(declarations: &[Declaration]) -> Result<()> {
    let mut seen = HashSet::new();
    for decl in declarations {
        if !seen.insert(&decl.name) {
            return Err(CirrusError::graph(format!(
                "duplicate node name: \"{}\"",
                decl.name
            )));
        }
    }
    Ok(())
}

/// Every dependency must have a smaller declaration index than its consumer.
pub fn check_backward_references(declarations: &[Declaration]) -> Result<()> {
    for (position, decl) in declarations.iter().enumerate() {
        if decl.id.index() != position {
            return Err(CirrusError::graph(format!(
                "\"{}\" is out of declaration order",
                decl.name
            )));
        }
        if let Some(dep) = decl.dependencies().into_iter().find(|d| d.index() >= position) {
            return Err(CirrusError::graph(format!(
                "\"{}\" references node {dep}, which is not declared before it",
                decl.name
            )));
        }
    }
    Ok(())
}

fn check_exports(declarations: &[Declaration], exports: &[Export]) -> Result<()> {
    for export in exports {
        if let Some(dep) = export
            .value
            .dependencies()
            .into_iter()
            .find(|d| d.index() >= declarations.len())
        {
            return Err(CirrusError::NotFound {
                kind: "node",
                id: format!("export \"{}\" references {dep}", export.name),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use cirrus_common::types::Urn;

    use super::*;
    use crate::declaration::{NodeKind, ResourceOptions};
    use crate::input::{Input, NodeId, OutputRef, PropertyPath};

    fn make_decl(index: usize, name: &str, deps: &[usize]) -> Declaration {
        let inputs = deps
            .iter()
            .enumerate()
            .map(|(i, d)| {
                (
                    format!("in{i}"),
                    Input::Output(OutputRef {
                        node: NodeId::new(*d),
                        path: PropertyPath::key("name"),
                    }),
                )
            })
            .collect::<BTreeMap<_, _>>();
        Declaration {
            id: NodeId::new(index),
            kind: NodeKind::Resource,
            type_token: "test:index:Thing".into(),
            name: name.into(),
            urn: Urn::new("dev", "p", "test:index:Thing", name),
            inputs,
            options: ResourceOptions::default(),
        }
    }

    #[test]
    fn validate_empty_graph_succeeds() {
        let graph = DeploymentGraph::new("p", "dev");
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn validate_built_graph_succeeds() {
        let mut graph = DeploymentGraph::new("p", "dev");
        let a = graph
            .register_resource(
                "test:index:Thing",
                "a",
                Vec::<(String, Input)>::new(),
                ResourceOptions::default(),
            )
            .expect("a");
        let _ = graph
            .register_resource(
                "test:index:Thing",
                "b",
                [("x", a.get("name"))],
                ResourceOptions::default(),
            )
            .expect("b");
        graph.export("a", a.get("name")).expect("export");
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn backward_references_pass() {
        let decls = vec![
            make_decl(0, "a", &[]),
            make_decl(1, "b", &[0]),
            make_decl(2, "c", &[0, 1]),
        ];
        assert!(check_backward_references(&decls).is_ok());
    }

    #[test]
    fn forward_reference_fails() {
        let decls = vec![make_decl(0, "a", &[1]), make_decl(1, "b", &[])];
        let err = check_backward_references(&decls).unwrap_err();
        assert!(err.to_string().contains("not declared before"), "got: {err}");
    }

    #[test]
    fn self_reference_fails() {
        let decls = vec![make_decl(0, "a", &[0])];
        assert!(check_backward_references(&decls).is_err());
    }

    #[test]
    fn misnumbered_declaration_fails() {
        let decls = vec![make_decl(1, "a", &[])];
        assert!(check_backward_references(&decls).is_err());
    }

    #[test]
    fn duplicate_names_fail() {
        let decls = vec![make_decl(0, "a", &[]), make_decl(1, "a", &[])];
        assert!(check_duplicate_names(&decls).is_err());
    }

    #[test]
    fn dangling_export_fails() {
        let decls = vec![make_decl(0, "a", &[])];
        let exports = vec![Export {
            name: "ip".into(),
            value: Input::Output(OutputRef {
                node: NodeId::new(3),
                path: PropertyPath::key("ip"),
            }),
        }];
        let err = check_exports(&decls, &exports).unwrap_err();
        assert!(matches!(err, CirrusError::NotFound { .. }));
    }
}
