//! Final status aggregation

use crate::core::graph::PipelineGraph;
use thiserror::Error;
use tracing::{error, info};

/// The run failed because a node did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {node} finished as {state}; failing this pipeline run")]
pub struct AggregationFailure {
    /// First non-successful node in declaration order
    pub node: String,
    /// That node's state label
    pub state: String,
}

/// Decides the outcome of a run from the states of every other node
pub struct StatusAggregator;

impl StatusAggregator {
    /// Check every node except `aggregator_id`; the first non-success wins
    pub fn evaluate(graph: &PipelineGraph, aggregator_id: &str) -> Result<(), AggregationFailure> {
        for node in graph.nodes().iter().filter(|n| n.id != aggregator_id) {
            info!("Task {} finished as {}", node.id, node.state.label());
            if !node.state.is_success() {
                let failure = AggregationFailure {
                    node: node.id.clone(),
                    state: node.state.label().to_string(),
                };
                error!("{}", failure);
                return Err(failure);
            }
        }

        info!("All tasks succeeded");
        Ok(())
    }
}
