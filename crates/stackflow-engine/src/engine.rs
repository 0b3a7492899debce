//! Wave execution engine
//!
//! Runs an [`EvaluationPlan`] against an injected [`ResourceProvider`].
//!
//! # Execution model
//!
//! - Waves run strictly one after another. Nodes inside a wave are
//!   independent and run as concurrent tokio tasks; the engine waits for all
//!   of them before starting the next wave.
//! - Tasks only return their own node's result. The engine loop is the only
//!   writer of node states and of the result table.
//! - A failed node marks every transitive dependent as skipped before the
//!   next wave starts. Unrelated nodes keep running.
//! - On cancellation, provider calls already in flight finish. Nodes still
//!   waiting for a `max_parallel` slot and every later wave never start and
//!   are reported as skipped.

use crate::action::{ActionType, decide_action, orphans};
use crate::declaration::{Declaration, Properties};
use crate::error::{EngineError, Result};
use crate::graph::{GraphBuilder, NodeIndex, NodeState, ResourceGraph};
use crate::plan::EvaluationPlan;
use crate::provider::{ProviderError, ResourceProvider};
use crate::report::{DeleteResult, EvaluationReport, ExecutionResult, NodeOutcome, SkipReason};
use crate::resolver::{OutputResolver, ResolveError};
use crate::state::{ResourceState, StackState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Engine tuning
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Upper bound on concurrent provider calls within a wave; `None` or 0
    /// means unbounded
    pub max_parallel: Option<usize>,
}

/// Per-node bookkeeping while the engine runs
#[derive(Debug, Default)]
struct Slot {
    action: Option<ActionType>,
    inputs: Properties,
    outcome: Option<NodeOutcome>,
}

/// Result of waiting for a provider slot
enum Reservation {
    Granted(Option<OwnedSemaphorePermit>),
    Cancelled,
}

/// Resource graph execution engine
pub struct Engine {
    provider: Arc<dyn ResourceProvider>,
    permits: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            permits: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.permits = config
            .max_parallel
            .filter(|&n| n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this engine's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Build, schedule and run `declarations` from scratch.
    ///
    /// Build errors are returned before the provider is called at all.
    pub async fn evaluate(&self, declarations: Vec<Declaration>) -> Result<EvaluationReport> {
        let graph = GraphBuilder::new().build(declarations)?;
        let plan = EvaluationPlan::schedule(&graph)?;
        self.run(graph, &plan, None).await
    }

    /// Execute `plan` over `graph`.
    ///
    /// With `prior` state, unchanged nodes are not sent to the provider and
    /// recorded resources that are no longer declared are destroyed after
    /// the last wave.
    pub async fn run(
        &self,
        mut graph: ResourceGraph,
        plan: &EvaluationPlan,
        prior: Option<&StackState>,
    ) -> Result<EvaluationReport> {
        let start = Instant::now();
        let planned: usize = plan.waves().iter().map(Vec::len).sum();
        if planned != graph.len() {
            return Err(EngineError::InvalidDeclaration(format!(
                "plan covers {} nodes but the graph has {}",
                planned,
                graph.len()
            )));
        }

        let mut slots: Vec<Slot> = (0..graph.len()).map(|_| Slot::default()).collect();
        let mut cancelled = false;

        for (wave_number, wave) in plan.waves().iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("Cancellation requested, not starting wave {}", wave_number);
                cancelled = true;
                break;
            }

            tracing::info!("Starting wave {} ({} nodes)", wave_number, wave.len());
            let mut tasks = JoinSet::new();
            let mut task_nodes = HashMap::new();

            for &index in wave {
                if graph.node(index).state.is_terminal() {
                    // already skipped because of an earlier failure
                    continue;
                }
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    skip(&mut graph, &mut slots, index, SkipReason::Cancelled)?;
                    continue;
                }
                graph.node_mut(index).transition_to(NodeState::Resolving)?;

                let inputs = match OutputResolver::new(&graph).resolve(index) {
                    Ok(inputs) => inputs,
                    Err(err) => {
                        let reason = skip_reason(err);
                        tracing::warn!("Skipping {}: {}", graph.node(index).name, reason);
                        skip(&mut graph, &mut slots, index, reason)?;
                        let reason = SkipReason::DependencySkipped {
                            dependency: graph.node(index).name.clone(),
                        };
                        skip_dependents(&mut graph, &mut slots, index, reason)?;
                        continue;
                    }
                };

                let node = graph.node(index);
                let recorded = prior.and_then(|s| s.get(&node.name));
                let action = decide_action(recorded, &node.resource_type, &inputs);
                slots[index].action = Some(action);

                if action == ActionType::NoOp {
                    tracing::info!("{} is up to date", node.name);
                    let outputs = recorded.map(|r| r.outputs.clone()).unwrap_or_default();
                    slots[index].inputs = inputs;
                    graph.node_mut(index).transition_to(NodeState::Executing)?;
                    complete(&mut graph, &mut slots, index, Ok(outputs))?;
                    continue;
                }

                let permit = match self.reserve().await {
                    Reservation::Granted(permit) => permit,
                    Reservation::Cancelled => {
                        tracing::warn!("Cancellation requested, not starting {}", node.name);
                        cancelled = true;
                        skip(&mut graph, &mut slots, index, SkipReason::Cancelled)?;
                        continue;
                    }
                };

                let operation = NodeOperation {
                    provider: self.provider.clone(),
                    permit,
                    name: node.name.clone(),
                    resource_type: node.resource_type.clone(),
                    action,
                    inputs: inputs.clone(),
                    recorded: recorded.cloned(),
                };
                slots[index].inputs = inputs;
                graph.node_mut(index).transition_to(NodeState::Executing)?;

                let handle = tasks.spawn(operation.run());
                task_nodes.insert(handle.id(), index);
            }

            // wave barrier
            while let Some(joined) = tasks.join_next_with_id().await {
                let (index, result) = match joined {
                    Ok((id, result)) => (task_nodes[&id], result),
                    Err(join_err) => {
                        tracing::error!(?join_err, "provider task panicked");
                        let index = task_nodes[&join_err.id()];
                        let err = ProviderError::new(format!("provider task panicked: {}", join_err));
                        (index, Err(err))
                    }
                };
                complete(&mut graph, &mut slots, index, result)?;
            }
        }

        for index in 0..graph.len() {
            if graph.node(index).state == NodeState::Pending {
                cancelled = true;
                skip(&mut graph, &mut slots, index, SkipReason::Cancelled)?;
            }
        }

        let mut deleted = Vec::new();
        if let Some(prior) = prior {
            for (name, resource) in orphans(&graph, prior) {
                if self.cancel.is_cancelled() {
                    tracing::warn!("Cancellation requested, keeping orphan {}", name);
                    cancelled = true;
                    break;
                }
                deleted.push(self.destroy(name, resource).await);
            }
        }

        let results = graph
            .nodes()
            .zip(slots)
            .map(|((index, node), slot)| ExecutionResult {
                name: node.name.clone(),
                resource_type: node.resource_type.clone(),
                wave: plan.wave_of(index),
                action: slot.action,
                inputs: slot.inputs,
                outcome: slot.outcome.unwrap_or_else(|| NodeOutcome::Skipped {
                    reason: SkipReason::Cancelled,
                }),
            })
            .collect();

        let report = EvaluationReport {
            results,
            waves: plan.node_names(&graph),
            deleted,
            cancelled,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!("Evaluation finished: {}", report.summary());
        Ok(report)
    }

    /// Wait for a `max_parallel` slot unless the run is cancelled first
    async fn reserve(&self) -> Reservation {
        if self.cancel.is_cancelled() {
            return Reservation::Cancelled;
        }
        let Some(permits) = &self.permits else {
            return Reservation::Granted(None);
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Reservation::Cancelled,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => Reservation::Granted(Some(permit)),
                // the semaphore is never closed while the engine is alive
                Err(_) => Reservation::Cancelled,
            },
        }
    }

    /// Destroy every resource recorded in `state`, dependents first
    pub async fn destroy_all(&self, state: &StackState) -> Vec<DeleteResult> {
        let mut deleted = Vec::new();
        for (name, resource) in state.teardown_order() {
            if self.cancel.is_cancelled() {
                tracing::warn!("Cancellation requested, stopping teardown before {}", name);
                break;
            }
            deleted.push(self.destroy(name, resource).await);
        }
        deleted
    }

    async fn destroy(&self, name: &str, resource: &ResourceState) -> DeleteResult {
        tracing::info!("Destroying {} ({})", name, resource.resource_type);
        let error = match self
            .provider
            .destroy(&resource.resource_type, &resource.outputs)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to destroy {}: {}", name, e);
                Some(e.message)
            }
        };
        DeleteResult {
            name: name.to_string(),
            resource_type: resource.resource_type.clone(),
            error,
        }
    }
}

/// Everything a task needs to run one node against the provider
struct NodeOperation {
    provider: Arc<dyn ResourceProvider>,
    permit: Option<OwnedSemaphorePermit>,
    name: String,
    resource_type: String,
    action: ActionType,
    inputs: Properties,
    recorded: Option<ResourceState>,
}

impl NodeOperation {
    async fn run(self) -> std::result::Result<Properties, ProviderError> {
        // released when the provider call returns
        let _permit = self.permit;

        tracing::info!(
            "{} {} ({}) via {}",
            self.action,
            self.name,
            self.resource_type,
            self.provider.name()
        );

        match (self.action, &self.recorded) {
            (ActionType::Update, Some(recorded)) => {
                self.provider
                    .update(&self.resource_type, &recorded.outputs, &self.inputs)
                    .await
            }
            (ActionType::Replace, Some(recorded)) => {
                self.provider
                    .destroy(&recorded.resource_type, &recorded.outputs)
                    .await?;
                self.provider.apply(&self.resource_type, &self.inputs).await
            }
            _ => self.provider.apply(&self.resource_type, &self.inputs).await,
        }
    }
}

fn skip_reason(err: ResolveError) -> SkipReason {
    match err {
        ResolveError::DependencyFailed(dependency) => SkipReason::DependencyFailed { dependency },
        ResolveError::DependencySkipped(dependency) => {
            SkipReason::DependencySkipped { dependency }
        }
        ResolveError::DependencyPending(dependency) => {
            SkipReason::DependencyPending { dependency }
        }
        ResolveError::MissingOutput(missing) => SkipReason::MissingOutput {
            reference: missing.reference,
        },
    }
}

fn skip(
    graph: &mut ResourceGraph,
    slots: &mut [Slot],
    index: NodeIndex,
    reason: SkipReason,
) -> Result<()> {
    graph.node_mut(index).transition_to(NodeState::Skipped)?;
    slots[index].outcome = Some(NodeOutcome::Skipped { reason });
    Ok(())
}

/// Skip every not-yet-started transitive dependent of `index`
fn skip_dependents(
    graph: &mut ResourceGraph,
    slots: &mut [Slot],
    index: NodeIndex,
    reason: SkipReason,
) -> Result<()> {
    for dependent in graph.transitive_dependents(index) {
        if graph.node(dependent).state == NodeState::Pending {
            tracing::debug!(
                "Skipping {} (depends on {})",
                graph.node(dependent).name,
                graph.node(index).name
            );
            skip(graph, slots, dependent, reason.clone())?;
        }
    }
    Ok(())
}

fn complete(
    graph: &mut ResourceGraph,
    slots: &mut [Slot],
    index: NodeIndex,
    result: std::result::Result<Properties, ProviderError>,
) -> Result<()> {
    match result {
        Ok(outputs) => {
            tracing::info!("{} succeeded", graph.node(index).name);
            let node = graph.node_mut(index);
            node.transition_to(NodeState::Succeeded)?;
            node.outputs = outputs.clone();
            slots[index].outcome = Some(NodeOutcome::Succeeded { outputs });
        }
        Err(err) => {
            let name = graph.node(index).name.clone();
            tracing::warn!("{} failed: {}", name, err);
            let outputs = err.partial_outputs.unwrap_or_default();
            let node = graph.node_mut(index);
            node.transition_to(NodeState::Failed)?;
            node.outputs = outputs.clone();
            slots[index].outcome = Some(NodeOutcome::Failed {
                error: err.message,
                outputs,
            });
            skip_dependents(
                graph,
                slots,
                index,
                SkipReason::DependencyFailed { dependency: name },
            )?;
        }
    }
    Ok(())
}
