//! Evaluation results

use crate::action::ActionType;
use crate::declaration::{Properties, Reference};
use crate::graph::NodeState;
use serde::{Deserialize, Serialize};

/// Why a node was never executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// A (transitive) dependency failed
    DependencyFailed { dependency: String },
    /// A referenced dependency was itself skipped
    DependencySkipped { dependency: String },
    /// A referenced dependency had not reached a terminal state
    DependencyPending { dependency: String },
    /// A referenced output key was not produced
    MissingOutput { reference: Reference },
    /// The run was cancelled before the node started
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DependencyFailed { dependency } => {
                write!(f, "dependency '{}' failed", dependency)
            }
            SkipReason::DependencySkipped { dependency } => {
                write!(f, "dependency '{}' was skipped", dependency)
            }
            SkipReason::DependencyPending { dependency } => {
                write!(f, "dependency '{}' had not finished", dependency)
            }
            SkipReason::MissingOutput { reference } => {
                write!(f, "output '{}' is missing", reference)
            }
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal outcome of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeOutcome {
    Succeeded {
        outputs: Properties,
    },
    Failed {
        error: String,
        /// Outputs observed before the failure
        #[serde(default, skip_serializing_if = "Properties::is_empty")]
        outputs: Properties,
    },
    Skipped {
        reason: SkipReason,
    },
}

/// Result of a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub name: String,
    pub resource_type: String,
    pub wave: usize,
    /// Action taken, absent for skipped nodes
    pub action: Option<ActionType>,
    /// Inputs handed to the provider after resolution
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub inputs: Properties,
    pub outcome: NodeOutcome,
}

impl ExecutionResult {
    pub fn state(&self) -> NodeState {
        match self.outcome {
            NodeOutcome::Succeeded { .. } => NodeState::Succeeded,
            NodeOutcome::Failed { .. } => NodeState::Failed,
            NodeOutcome::Skipped { .. } => NodeState::Skipped,
        }
    }

    pub fn outputs(&self) -> Option<&Properties> {
        match &self.outcome {
            NodeOutcome::Succeeded { outputs } => Some(outputs),
            NodeOutcome::Failed { outputs, .. } if !outputs.is_empty() => Some(outputs),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            NodeOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.outcome {
            NodeOutcome::Skipped { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Result of destroying a resource that is no longer declared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub name: String,
    pub resource_type: String,
    pub error: Option<String>,
}

impl DeleteResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Full result of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// One entry per declared node, in declaration order
    pub results: Vec<ExecutionResult>,

    /// Logical names per wave
    pub waves: Vec<Vec<String>>,

    /// Orphaned resources destroyed after the last wave
    pub deleted: Vec<DeleteResult>,

    /// Whether cancellation was requested during the run
    pub cancelled: bool,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl EvaluationReport {
    pub fn get(&self, name: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Look up `reference` in the outputs of a succeeded node
    pub fn output(&self, reference: &Reference) -> Option<&serde_json::Value> {
        match &self.get(&reference.target)?.outcome {
            NodeOutcome::Succeeded { outputs } => outputs.get(&reference.output),
            _ => None,
        }
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.results.iter().filter(|r| r.state() == state).count()
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self.results.iter().all(|r| r.state() == NodeState::Succeeded)
            && self.deleted.iter().all(DeleteResult::is_success)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            succeeded: self.count(NodeState::Succeeded),
            failed: self.count(NodeState::Failed),
            skipped: self.count(NodeState::Skipped),
            deleted: self.deleted.iter().filter(|d| d.is_success()).count(),
        }
    }
}

/// Counts per terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub deleted: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped, {} deleted",
            self.succeeded, self.failed, self.skipped, self.deleted
        )
    }
}
