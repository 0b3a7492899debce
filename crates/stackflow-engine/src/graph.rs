//! Resource graph construction
//!
//! Turns an ordered list of [`Declaration`]s into a validated
//! [`ResourceGraph`]. Edges are never stored on their own: they are derived
//! from the references inside each node's inputs and cached as index lists.

use crate::declaration::{Declaration, InputValue, Properties, Reference, ResourceSchema};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Index of a node within its graph (equals its declaration position)
pub type NodeIndex = usize;

/// Lifecycle state of a node during one evaluation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Waiting for its wave
    Pending,
    /// References are being substituted
    Resolving,
    /// Provider call in flight
    Executing,
    /// Provider call returned outputs
    Succeeded,
    /// Provider call returned an error
    Failed,
    /// Never executed (dependency failure, missing output, or cancellation)
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Succeeded | NodeState::Failed | NodeState::Skipped
        )
    }

    /// Allowed edges of the per-node state machine
    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Pending, Resolving)
                | (Pending, Skipped)
                | (Resolving, Executing)
                | (Resolving, Skipped)
                | (Executing, Succeeded)
                | (Executing, Failed)
        )
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Resolving => write!(f, "resolving"),
            NodeState::Executing => write!(f, "executing"),
            NodeState::Succeeded => write!(f, "succeeded"),
            NodeState::Failed => write!(f, "failed"),
            NodeState::Skipped => write!(f, "skipped"),
        }
    }
}

/// One declared resource inside the graph
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub name: String,
    pub resource_type: String,
    pub inputs: BTreeMap<String, InputValue>,
    pub state: NodeState,
    /// Outputs observed so far; may be partial
    pub outputs: Properties,
}

impl ResourceNode {
    fn from_declaration(decl: Declaration) -> Self {
        Self {
            name: decl.logical_name,
            resource_type: decl.resource_type,
            inputs: decl.inputs,
            state: NodeState::Pending,
            outputs: Properties::new(),
        }
    }

    /// Move to `next`, rejecting edges the state machine does not allow
    pub fn transition_to(&mut self, next: NodeState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                node: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(node = %self.name, from = %self.state, to = %next, "transition");
        self.state = next;
        Ok(())
    }
}

/// Validated, acyclic graph of resources
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<String, NodeIndex>,
    /// Sorted, de-duplicated dependency indices per node
    dependencies: Vec<Vec<NodeIndex>>,
    /// Sorted dependent indices per node
    dependents: Vec<Vec<NodeIndex>>,
    schema: ResourceSchema,
}

impl ResourceGraph {
    /// Build a graph without output schema checks
    pub fn build(declarations: Vec<Declaration>) -> Result<Self> {
        GraphBuilder::new().build(declarations)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: NodeIndex) -> &ResourceNode {
        &self.nodes[index]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut ResourceNode {
        &mut self.nodes[index]
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &ResourceNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&ResourceNode> {
        self.index_of(name).map(|i| &self.nodes[i])
    }

    pub fn dependencies(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.dependencies[index]
    }

    pub fn dependents(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.dependents[index]
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Every node that depends on `index` directly or transitively, in
    /// declaration order
    pub fn transitive_dependents(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            for &dependent in &self.dependents[current] {
                if seen.insert(dependent) {
                    stack.push(dependent);
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Check a reference coming from outside the graph (e.g. a stack export)
    pub fn check_reference(&self, reference: &Reference) -> Result<()> {
        check_reference_target(&self.index, &self.nodes, &self.schema, reference).map_err(
            |reason| EngineError::UnresolvedReference {
                node: "(export)".to_string(),
                property: reference.output.clone(),
                reference: reference.clone(),
                reason,
            },
        )
    }
}

/// Builder for [`ResourceGraph`]
#[derive(Debug, Default)]
pub struct GraphBuilder {
    schema: ResourceSchema,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate output references against declared per-type outputs
    pub fn with_schema(mut self, schema: ResourceSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn build(self, declarations: Vec<Declaration>) -> Result<ResourceGraph> {
        let mut index = HashMap::with_capacity(declarations.len());
        for (i, decl) in declarations.iter().enumerate() {
            if decl.logical_name.is_empty() {
                return Err(EngineError::InvalidDeclaration(format!(
                    "resource #{} has an empty name",
                    i
                )));
            }
            if decl.resource_type.is_empty() {
                return Err(EngineError::InvalidDeclaration(format!(
                    "resource '{}' has an empty type",
                    decl.logical_name
                )));
            }
            if index.insert(decl.logical_name.clone(), i).is_some() {
                return Err(EngineError::DuplicateNode(decl.logical_name.clone()));
            }
        }

        let nodes: Vec<ResourceNode> = declarations
            .into_iter()
            .map(ResourceNode::from_declaration)
            .collect();

        let mut dependencies = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let mut deps = BTreeSet::new();
            for (property, value) in &node.inputs {
                let Some(reference) = value.as_reference() else {
                    continue;
                };
                check_reference_target(&index, &nodes, &self.schema, reference).map_err(
                    |reason| EngineError::UnresolvedReference {
                        node: node.name.clone(),
                        property: property.clone(),
                        reference: reference.clone(),
                        reason,
                    },
                )?;
                deps.insert(index[&reference.target]);
            }
            dependencies.push(deps.into_iter().collect::<Vec<_>>());
        }

        let mut dependents = vec![Vec::new(); nodes.len()];
        for (i, deps) in dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(i);
            }
        }

        if let Some(cycle) = find_cycle(&nodes, &dependencies) {
            return Err(EngineError::CyclicDependency { cycle });
        }

        tracing::debug!(
            "Built resource graph: {} nodes, {} edges",
            nodes.len(),
            dependencies.iter().map(Vec::len).sum::<usize>()
        );

        Ok(ResourceGraph {
            nodes,
            index,
            dependencies,
            dependents,
            schema: self.schema,
        })
    }
}

fn check_reference_target(
    index: &HashMap<String, NodeIndex>,
    nodes: &[ResourceNode],
    schema: &ResourceSchema,
    reference: &Reference,
) -> std::result::Result<(), String> {
    let Some(&target) = index.get(&reference.target) else {
        return Err(format!("resource '{}' is not declared", reference.target));
    };
    let target_type = &nodes[target].resource_type;
    if let Some(outputs) = schema.outputs_of(target_type)
        && !outputs.contains(&reference.output)
    {
        return Err(format!(
            "type '{}' does not declare output '{}'",
            target_type, reference.output
        ));
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first search in declaration order. Returns the members of the first
/// cycle found, starting at the node where the cycle closes.
fn find_cycle(nodes: &[ResourceNode], dependencies: &[Vec<NodeIndex>]) -> Option<Vec<String>> {
    fn visit(
        node: NodeIndex,
        dependencies: &[Vec<NodeIndex>],
        marks: &mut [Mark],
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        marks[node] = Mark::InProgress;
        path.push(node);
        for &dep in &dependencies[node] {
            match marks[dep] {
                Mark::InProgress => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    return Some(path[start..].to_vec());
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(dep, dependencies, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        path.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut path = Vec::new();
    for start in 0..nodes.len() {
        if marks[start] == Mark::Unvisited
            && let Some(cycle) = visit(start, dependencies, &mut marks, &mut path)
        {
            return Some(cycle.into_iter().map(|i| nodes[i].name.clone()).collect());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> Declaration {
        Declaration::new("key", "ssh-key").with_literal("name", json!("deployment-key"))
    }

    fn vps() -> Declaration {
        Declaration::new("web", "vps")
            .with_literal("image", json!("ubuntu-24.04"))
            .with_reference("ssh_key_id", "key", "id")
    }

    #[test]
    fn test_build_derives_edges() {
        let graph = ResourceGraph::build(vec![key(), vps()]).unwrap();
        assert_eq!(graph.len(), 2);

        let web = graph.index_of("web").unwrap();
        let key = graph.index_of("key").unwrap();
        assert_eq!(graph.dependencies(web), &[key]);
        assert_eq!(graph.dependents(key), &[web]);
        assert!(graph.nodes().all(|(_, n)| n.state == NodeState::Pending));
    }

    #[test]
    fn test_forward_reference_is_allowed() {
        // declaration order does not have to follow dependency order
        let graph = ResourceGraph::build(vec![vps(), key()]).unwrap();
        assert_eq!(graph.dependencies(0), &[1]);
    }

    #[test]
    fn test_unknown_target_is_unresolved() {
        let err = ResourceGraph::build(vec![vps()]).unwrap_err();
        match err {
            EngineError::UnresolvedReference {
                node,
                property,
                reference,
                ..
            } => {
                assert_eq!(node, "web");
                assert_eq!(property, "ssh_key_id");
                assert_eq!(reference, Reference::new("key", "id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_output_is_unresolved() {
        let schema = ResourceSchema::new().with_type("ssh-key", ["fingerprint"]);
        let err = GraphBuilder::new()
            .with_schema(schema)
            .build(vec![key(), vps()])
            .unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedReference { .. }));
        assert!(err.to_string().contains("key.id"));
    }

    #[test]
    fn test_duplicate_name() {
        let err = ResourceGraph::build(vec![key(), key()]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateNode(name) if name == "key"));
    }

    #[test]
    fn test_cycle_names_members() {
        let a = Declaration::new("a", "t").with_reference("x", "b", "id");
        let b = Declaration::new("b", "t").with_reference("x", "c", "id");
        let c = Declaration::new("c", "t").with_reference("x", "a", "id");
        let unrelated = Declaration::new("d", "t");

        let err = ResourceGraph::build(vec![unrelated, a, b, c]).unwrap_err();
        match err {
            EngineError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let a = Declaration::new("a", "t").with_reference("x", "a", "id");
        let err = ResourceGraph::build(vec![a]).unwrap_err();
        assert!(matches!(err, EngineError::CyclicDependency { cycle } if cycle == vec!["a"]));
    }

    #[test]
    fn test_transitive_dependents() {
        let a = Declaration::new("a", "t");
        let b = Declaration::new("b", "t").with_reference("x", "a", "id");
        let c = Declaration::new("c", "t").with_reference("x", "b", "id");
        let d = Declaration::new("d", "t");
        let graph = ResourceGraph::build(vec![a, b, c, d]).unwrap();
        assert_eq!(graph.transitive_dependents(0), vec![1, 2]);
        assert!(graph.transitive_dependents(3).is_empty());
    }

    #[test]
    fn test_state_machine() {
        let mut graph = ResourceGraph::build(vec![key()]).unwrap();
        let node = graph.node_mut(0);
        assert!(node.transition_to(NodeState::Executing).is_err());
        node.transition_to(NodeState::Resolving).unwrap();
        node.transition_to(NodeState::Executing).unwrap();
        node.transition_to(NodeState::Succeeded).unwrap();
        assert!(node.transition_to(NodeState::Skipped).is_err());
    }
}
