//! Engine error types

use crate::declaration::Reference;
use crate::graph::NodeState;
use thiserror::Error;

/// Errors that abort an evaluation before (or outside of) node execution.
///
/// Per-node failures are not represented here: they are recorded in the
/// [`EvaluationReport`](crate::EvaluationReport) and contained to the
/// failing node's dependency subtree.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Unresolved reference '{reference}' in {node}.{property}: {reason}")]
    UnresolvedReference {
        node: String,
        property: String,
        reference: Reference,
        reason: String,
    },

    #[error("Duplicate resource name: {0}")]
    DuplicateNode(String),

    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Invalid state transition for {node}: {from} -> {to}")]
    InvalidTransition {
        node: String,
        from: NodeState,
        to: NodeState,
    },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether this error was raised while building or scheduling the graph.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            EngineError::CyclicDependency { .. }
                | EngineError::UnresolvedReference { .. }
                | EngineError::DuplicateNode(_)
                | EngineError::InvalidDeclaration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
