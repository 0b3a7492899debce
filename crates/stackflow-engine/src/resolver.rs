//! Output resolution
//!
//! Substitutes every [`Reference`] in a node's inputs with the value the
//! referenced node produced. Availability is checked per output key at the
//! moment of resolution, so a dependency that exposed only some of its
//! outputs still satisfies references to the keys it did expose.

use crate::declaration::{InputValue, Properties, Reference};
use crate::graph::{NodeIndex, NodeState, ResourceGraph, ResourceNode};
use thiserror::Error;

/// A reference points at an output key the dependency never produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing output '{reference}' required by {node}")]
pub struct MissingOutputError {
    /// Node whose input could not be resolved
    pub node: String,
    pub reference: Reference,
}

/// Why a node's inputs could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("dependency '{0}' failed")]
    DependencyFailed(String),

    #[error("dependency '{0}' was skipped")]
    DependencySkipped(String),

    #[error("dependency '{0}' has not finished")]
    DependencyPending(String),

    #[error(transparent)]
    MissingOutput(#[from] MissingOutputError),
}

/// What is known about a referenced node at resolution time
#[derive(Debug, Clone, Copy)]
pub enum Upstream<'a> {
    Ready(&'a Properties),
    Failed,
    Skipped,
    Pending,
}

/// Resolve `node`'s inputs, asking `lookup` about each referenced target.
///
/// References are visited in input-key order, so the reported error is
/// deterministic when several references are unusable.
pub fn resolve_inputs<'a, F>(node: &ResourceNode, lookup: F) -> Result<Properties, ResolveError>
where
    F: Fn(&str) -> Upstream<'a>,
{
    let mut resolved = Properties::new();
    for (key, value) in &node.inputs {
        let value = match value {
            InputValue::Literal(v) => v.clone(),
            InputValue::Reference(reference) => match lookup(&reference.target) {
                Upstream::Ready(outputs) => match outputs.get(&reference.output) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(MissingOutputError {
                            node: node.name.clone(),
                            reference: reference.clone(),
                        }
                        .into());
                    }
                },
                Upstream::Failed => {
                    return Err(ResolveError::DependencyFailed(reference.target.clone()));
                }
                Upstream::Skipped => {
                    return Err(ResolveError::DependencySkipped(reference.target.clone()));
                }
                Upstream::Pending => {
                    return Err(ResolveError::DependencyPending(reference.target.clone()));
                }
            },
        };
        resolved.insert(key.clone(), value);
    }
    Ok(resolved)
}

/// Resolves nodes against the live states and outputs held by the graph
pub struct OutputResolver<'g> {
    graph: &'g ResourceGraph,
}

impl<'g> OutputResolver<'g> {
    pub fn new(graph: &'g ResourceGraph) -> Self {
        Self { graph }
    }

    pub fn resolve(&self, index: NodeIndex) -> Result<Properties, ResolveError> {
        let graph = self.graph;
        resolve_inputs(graph.node(index), |target| {
            let Some(node) = graph.get(target) else {
                // the builder rejects unknown targets, so this is unreachable
                return Upstream::Pending;
            };
            match node.state {
                NodeState::Succeeded => Upstream::Ready(&node.outputs),
                NodeState::Failed => Upstream::Failed,
                NodeState::Skipped => Upstream::Skipped,
                NodeState::Pending | NodeState::Resolving | NodeState::Executing => {
                    Upstream::Pending
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;
    use serde_json::json;

    fn graph() -> ResourceGraph {
        ResourceGraph::build(vec![
            Declaration::new("cache", "cache"),
            Declaration::new("app", "vps")
                .with_literal("image", json!("ubuntu-24.04"))
                .with_reference("cache_host", "cache", "endpoint")
                .with_reference("cache_port", "cache", "port"),
        ])
        .unwrap()
    }

    fn finish(graph: &mut ResourceGraph, index: NodeIndex, state: NodeState, outputs: Properties) {
        let node = graph.node_mut(index);
        node.transition_to(NodeState::Resolving).unwrap();
        node.transition_to(NodeState::Executing).unwrap();
        node.transition_to(state).unwrap();
        node.outputs = outputs;
    }

    #[test]
    fn test_resolves_literals_and_references() {
        let mut g = graph();
        finish(
            &mut g,
            0,
            NodeState::Succeeded,
            Properties::from([
                ("endpoint".to_string(), json!("cache.internal")),
                ("port".to_string(), json!(6379)),
            ]),
        );

        let resolved = OutputResolver::new(&g).resolve(1).unwrap();
        assert_eq!(resolved["image"], json!("ubuntu-24.04"));
        assert_eq!(resolved["cache_host"], json!("cache.internal"));
        assert_eq!(resolved["cache_port"], json!(6379));
    }

    #[test]
    fn test_partial_outputs_report_missing_key() {
        let mut g = graph();
        finish(
            &mut g,
            0,
            NodeState::Succeeded,
            Properties::from([("endpoint".to_string(), json!("cache.internal"))]),
        );

        let err = OutputResolver::new(&g).resolve(1).unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingOutput(MissingOutputError {
                node: "app".to_string(),
                reference: Reference::new("cache", "port"),
            })
        );
    }

    #[test]
    fn test_failed_dependency() {
        let mut g = graph();
        finish(&mut g, 0, NodeState::Failed, Properties::new());
        let err = OutputResolver::new(&g).resolve(1).unwrap_err();
        assert_eq!(err, ResolveError::DependencyFailed("cache".to_string()));
    }

    #[test]
    fn test_pending_dependency() {
        let g = graph();
        let err = OutputResolver::new(&g).resolve(1).unwrap_err();
        assert_eq!(err, ResolveError::DependencyPending("cache".to_string()));
    }
}
