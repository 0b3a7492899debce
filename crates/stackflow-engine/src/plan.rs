//! Wave scheduling
//!
//! Partitions a [`ResourceGraph`] into waves with Kahn's algorithm. Every
//! node in wave `k` depends only on nodes in waves `< k`, and its wave number
//! is the maximum wave of its dependencies plus one.

use crate::error::{EngineError, Result};
use crate::graph::{NodeIndex, ResourceGraph};
use serde::{Deserialize, Serialize};

/// Ordered partition of a graph's nodes into waves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationPlan {
    waves: Vec<Vec<NodeIndex>>,
    /// Wave number per node index
    wave_of: Vec<usize>,
}

impl EvaluationPlan {
    /// Compute the waves of `graph`. Members of a wave keep declaration order
    /// so that provider side effects are issued in a reproducible order.
    pub fn schedule(graph: &ResourceGraph) -> Result<Self> {
        let n = graph.len();
        let mut in_degree: Vec<usize> = (0..n).map(|i| graph.dependencies(i).len()).collect();
        let mut wave_of = vec![usize::MAX; n];
        let mut waves: Vec<Vec<NodeIndex>> = Vec::new();

        // declaration order falls out of scanning indices in ascending order
        let mut ready: Vec<NodeIndex> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut placed = 0;

        while !ready.is_empty() {
            let wave_number = waves.len();
            let mut next = Vec::new();
            for &node in &ready {
                wave_of[node] = wave_number;
                for &dependent in graph.dependents(node) {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            placed += ready.len();
            next.sort_unstable();
            waves.push(std::mem::replace(&mut ready, next));
        }

        if placed != n {
            let cycle = (0..n)
                .filter(|&i| wave_of[i] == usize::MAX)
                .map(|i| graph.node(i).name.clone())
                .collect();
            return Err(EngineError::CyclicDependency { cycle });
        }

        tracing::debug!("Scheduled {} nodes into {} waves", n, waves.len());
        Ok(Self { waves, wave_of })
    }

    pub fn waves(&self) -> &[Vec<NodeIndex>] {
        &self.waves
    }

    pub fn wave_of(&self, node: NodeIndex) -> usize {
        self.wave_of[node]
    }

    /// Number of waves
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Logical names per wave
    pub fn node_names(&self, graph: &ResourceGraph) -> Vec<Vec<String>> {
        self.waves
            .iter()
            .map(|wave| wave.iter().map(|&i| graph.node(i).name.clone()).collect())
            .collect()
    }
}
