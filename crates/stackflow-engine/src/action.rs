//! Action types for resource changes
//!
//! Decides, per node, whether the provider has to be called at all and
//! previews those decisions without touching the provider.

use crate::declaration::Properties;
use crate::graph::ResourceGraph;
use crate::plan::EvaluationPlan;
use crate::resolver::{ResolveError, Upstream, resolve_inputs};
use crate::state::{ResourceState, ResourceStatus, StackState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Destroy the recorded resource, then create one of the new type
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Decide what to do with a node whose inputs are fully resolved
pub fn decide_action(
    prior: Option<&ResourceState>,
    resource_type: &str,
    inputs: &Properties,
) -> ActionType {
    match prior {
        None => ActionType::Create,
        Some(prior) if prior.resource_type != resource_type => ActionType::Replace,
        Some(prior) if prior.status == ResourceStatus::Active && prior.inputs == *inputs => {
            ActionType::NoOp
        }
        Some(_) => ActionType::Update,
    }
}

/// Input keys whose value differs between `before` and `after`
pub fn changed_keys(before: &Properties, after: &Properties) -> Vec<String> {
    before
        .keys()
        .chain(after.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|k| before.get(*k) != after.get(*k))
        .cloned()
        .collect()
}

/// Represents a planned action for a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "vps", "storage-bucket")
    pub resource_type: String,

    /// Logical name of the resource
    pub resource_id: String,

    /// Wave the action runs in; deletions run after the last wave
    pub wave: Option<usize>,

    /// Description of the action
    pub description: String,

    /// Additional details about the action
    pub details: HashMap<String, serde_json::Value>,
}

/// Predicted changes of an evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl ChangePlan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    /// Predict the action of every node without calling the provider
    ///
    /// Outputs are only predictable for nodes expected to be unchanged, in
    /// which case the recorded outputs are reused. Nodes referencing
    /// anything else get inputs "known after apply".
    pub fn preview(graph: &ResourceGraph, plan: &EvaluationPlan, prior: &StackState) -> Self {
        let mut predicted: Vec<Option<&Properties>> = vec![None; graph.len()];
        let mut actions = Vec::with_capacity(graph.len());

        for (wave_number, wave) in plan.waves().iter().enumerate() {
            for &index in wave {
                let node = graph.node(index);
                let recorded = prior.get(&node.name);
                let resolved = resolve_inputs(node, |target| {
                    match graph.index_of(target).and_then(|i| predicted[i]) {
                        Some(outputs) => Upstream::Ready(outputs),
                        None => Upstream::Pending,
                    }
                });

                let mut details = HashMap::new();
                let (action_type, description) = match resolved {
                    Ok(inputs) => {
                        let action_type = decide_action(recorded, &node.resource_type, &inputs);
                        if let Some(recorded) = recorded
                            && action_type == ActionType::Update
                        {
                            details.insert(
                                "changed".to_string(),
                                serde_json::json!(changed_keys(&recorded.inputs, &inputs)),
                            );
                        }
                        if action_type == ActionType::NoOp {
                            predicted[index] = recorded.map(|r| &r.outputs);
                        }
                        (action_type, describe(action_type, &node.name, &node.resource_type))
                    }
                    Err(ResolveError::MissingOutput(_) | ResolveError::DependencyPending(_)) => {
                        let action_type = match recorded {
                            None => ActionType::Create,
                            Some(r) if r.resource_type != node.resource_type => {
                                ActionType::Replace
                            }
                            Some(_) => ActionType::Update,
                        };
                        details.insert("inputs_known_after_apply".to_string(), true.into());
                        (action_type, describe(action_type, &node.name, &node.resource_type))
                    }
                    Err(ResolveError::DependencyFailed(_) | ResolveError::DependencySkipped(_)) => {
                        // preview never marks nodes failed or skipped
                        continue;
                    }
                };

                actions.push(Action {
                    id: format!("{}-{}", action_type, node.name),
                    action_type,
                    resource_type: node.resource_type.clone(),
                    resource_id: node.name.clone(),
                    wave: Some(wave_number),
                    description,
                    details,
                });
            }
        }

        for (name, resource) in orphans(graph, prior) {
            actions.push(Action {
                id: format!("delete-{}", name),
                action_type: ActionType::Delete,
                resource_type: resource.resource_type.clone(),
                resource_id: name.clone(),
                wave: None,
                description: describe(ActionType::Delete, name, &resource.resource_type),
                details: HashMap::new(),
            });
        }

        Self::new(actions)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Recorded resources that are no longer declared, in teardown order
pub fn orphans<'s>(
    graph: &ResourceGraph,
    prior: &'s StackState,
) -> Vec<(&'s String, &'s ResourceState)> {
    prior
        .teardown_order()
        .into_iter()
        .filter(|(name, _)| graph.index_of(name).is_none())
        .collect()
}

fn describe(action_type: ActionType, name: &str, resource_type: &str) -> String {
    match action_type {
        ActionType::Create => format!("create {} '{}'", resource_type, name),
        ActionType::Update => format!("update {} '{}'", resource_type, name),
        ActionType::Replace => format!("replace '{}' with a new {}", name, resource_type),
        ActionType::Delete => format!("delete {} '{}'", resource_type, name),
        ActionType::NoOp => format!("{} '{}' is up to date", resource_type, name),
    }
}

/// Summary of planned actions
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
