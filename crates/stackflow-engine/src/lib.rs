//! StackFlow Engine
//!
//! Dependency-aware evaluator for declared infrastructure resources.
//! Declarations reference each other's outputs; the engine derives the
//! dependency graph from those references, groups independent nodes into
//! waves and runs each wave concurrently against a [`ResourceProvider`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  StackFlow CLI                   │
//! │              (stack plan/up/down)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Vec<Declaration>
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-engine                   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ GraphBuilder │─▶│EvaluationPlan│ (waves)    │
//! │  └──────────────┘  └──────┬───────┘            │
//! │  ┌──────────────┐  ┌──────▼───────┐            │
//! │  │OutputResolver│◀─│    Engine    │            │
//! │  └──────────────┘  └──────┬───────┘            │
//! │  ┌──────────────┐         │                    │
//! │  │  State Mgmt  │◀────────┤ EvaluationReport   │
//! │  └──────────────┘         │                    │
//! └───────────────────────────┼─────────────────────┘
//!                             │ trait ResourceProvider
//!                 ┌───────────┴───────────┐
//!         ┌───────▼───────┐       ┌───────▼───────┐
//!         │   simulated   │       │  danubedata   │
//!         │   (dry run)   │       │  (HTTP API)   │
//!         └───────────────┘       └───────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use stackflow_engine::{Declaration, Engine, SimulatedProvider};
//! use std::sync::Arc;
//!
//! # async fn run() -> stackflow_engine::Result<()> {
//! let engine = Engine::new(Arc::new(SimulatedProvider::default()));
//! let report = engine
//!     .evaluate(vec![
//!         Declaration::new("my-key", "ssh_key").with_literal("name", json!("deploy")),
//!         Declaration::new("web-server", "vps").with_reference("ssh_key_id", "my-key", "id"),
//!     ])
//!     .await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod declaration;
pub mod engine;
pub mod error;
pub mod graph;
pub mod plan;
pub mod provider;
pub mod report;
pub mod resolver;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, ChangePlan, PlanSummary, decide_action};
pub use declaration::{Declaration, InputValue, Properties, Reference, ResourceSchema};
pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, Result};
pub use graph::{GraphBuilder, NodeIndex, NodeState, ResourceGraph, ResourceNode};
pub use plan::EvaluationPlan;
pub use provider::{ProviderError, ResourceProvider, RetryConfig, SIMULATED_VALUE, SimulatedProvider};
pub use report::{
    DeleteResult, EvaluationReport, ExecutionResult, NodeOutcome, ReportSummary, SkipReason,
};
pub use resolver::{MissingOutputError, OutputResolver, ResolveError};
pub use state::{ResourceState, ResourceStatus, StackState, StateLock, StateManager};
