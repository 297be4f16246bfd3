//! Main execution engine - drives a pipeline graph to completion

use crate::{
    core::{
        graph::{Gate, NodeKind, PipelineGraph},
        JobSpec, NodeState, RunStatus,
    },
    execution::aggregator::{AggregationFailure, StatusAggregator},
    gcp::{JobOutcome, JobSubmitter},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
    },
    /// A job was handed to the cluster and is awaiting a terminal state
    NodeSubmitted {
        node_id: String,
        main_python_file_uri: String,
    },
    /// The aggregation node started inspecting the other nodes
    NodeStarted {
        node_id: String,
    },
    NodeSucceeded {
        node_id: String,
        job_id: Option<String>,
    },
    NodeFailed {
        node_id: String,
        error: String,
    },
    /// The node never ran because of its dependencies
    NodeGated {
        node_id: String,
        state: NodeState,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
        failure: Option<String>,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Runs graph nodes in topological order, one at a time
pub struct ExecutionEngine<S> {
    submitter: S,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<S: JobSubmitter> ExecutionEngine<S> {
    pub fn new(submitter: S) -> Self {
        Self {
            submitter,
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute the whole graph.
    ///
    /// Job failures are recorded on their nodes and never returned directly;
    /// the aggregation node's verdict is the run's result.
    pub async fn execute(&self, graph: &mut PipelineGraph) -> Result<(), AggregationFailure> {
        let run_id = graph.state.run_id;
        info!("Starting pipeline run: {} ({})", graph.name, run_id);
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            pipeline_name: graph.name.clone(),
        })
        .await;

        graph.state.start();
        let mut verdict = Ok(());

        for node_id in graph.execution_order().to_vec() {
            match graph.gate(&node_id) {
                Gate::Open => {
                    if let Err(failure) = self.run_node(graph, &node_id).await {
                        verdict = Err(failure);
                    }
                }
                Gate::UpstreamFailed(upstream) => {
                    warn!("Task {} not run: upstream {} failed", node_id, upstream);
                    self.gate_node(graph, &node_id, NodeState::UpstreamFailed { upstream })
                        .await;
                }
                Gate::Skipped(upstream) => {
                    warn!("Task {} skipped: upstream {} did not succeed", node_id, upstream);
                    let reason = format!("upstream {} did not succeed", upstream);
                    self.gate_node(graph, &node_id, NodeState::Skipped { reason }).await;
                }
                Gate::Waiting => {
                    // Unreachable for a topologically ordered graph
                    error!("Task {} reached with unfinished dependencies", node_id);
                    let reason = "dependencies never finished".to_string();
                    self.gate_node(graph, &node_id, NodeState::Skipped { reason }).await;
                }
            }
        }

        match &verdict {
            Ok(()) => graph.state.complete(),
            Err(failure) => graph.state.fail(failure.to_string()),
        }

        info!(
            "Pipeline run finished: {} - {}",
            graph.name, graph.state.status
        );
        self.emit_event(ExecutionEvent::RunFinished {
            run_id,
            status: graph.state.status,
            failure: graph.state.failure.clone(),
        })
        .await;

        verdict
    }

    /// Run a single node whose gate is open
    async fn run_node(&self, graph: &mut PipelineGraph, node_id: &str) -> Result<(), AggregationFailure> {
        let kind = match graph.node(node_id) {
            Some(node) => node.kind.clone(),
            None => return Ok(()),
        };

        let started_at = Utc::now();
        graph.set_state(node_id, NodeState::Running { started_at });

        match kind {
            NodeKind::Job(spec) => {
                self.run_job(graph, node_id, &spec, started_at).await;
                Ok(())
            }
            NodeKind::Aggregate => {
                self.emit_event(ExecutionEvent::NodeStarted {
                    node_id: node_id.to_string(),
                })
                .await;

                let result = StatusAggregator::evaluate(graph, node_id);
                match &result {
                    Ok(()) => self.mark_node_success(graph, node_id, started_at, None).await,
                    Err(failure) => {
                        self.mark_node_failed(graph, node_id, failure.to_string(), started_at)
                            .await
                    }
                }
                result
            }
        }
    }

    /// Submit a job and wait for its terminal state
    async fn run_job(
        &self,
        graph: &mut PipelineGraph,
        node_id: &str,
        spec: &JobSpec,
        started_at: chrono::DateTime<Utc>,
    ) {
        info!(
            "Submitting {} ({}) with args {:?}",
            node_id,
            spec.main_python_file_uri,
            spec.redacted_args()
        );
        self.emit_event(ExecutionEvent::NodeSubmitted {
            node_id: node_id.to_string(),
            main_python_file_uri: spec.main_python_file_uri.clone(),
        })
        .await;

        match self.submitter.submit(spec).await {
            Ok(JobOutcome::Succeeded { job_id }) => {
                self.mark_node_success(graph, node_id, started_at, Some(job_id))
                    .await;
            }
            Ok(JobOutcome::Failed { job_id, detail }) => {
                let error = format!("job {} failed: {}", job_id, detail);
                self.mark_node_failed(graph, node_id, error, started_at).await;
            }
            Err(e) => {
                self.mark_node_failed(graph, node_id, e.to_string(), started_at)
                    .await;
            }
        }
    }

    async fn gate_node(&self, graph: &mut PipelineGraph, node_id: &str, state: NodeState) {
        graph.set_state(node_id, state.clone());
        self.emit_event(ExecutionEvent::NodeGated {
            node_id: node_id.to_string(),
            state,
        })
        .await;
    }

    /// Mark a node as completed successfully
    async fn mark_node_success(
        &self,
        graph: &mut PipelineGraph,
        node_id: &str,
        started_at: chrono::DateTime<Utc>,
        job_id: Option<String>,
    ) {
        info!("Task {} succeeded", node_id);
        graph.set_state(
            node_id,
            NodeState::Success {
                started_at,
                finished_at: Utc::now(),
                job_id: job_id.clone(),
            },
        );
        self.emit_event(ExecutionEvent::NodeSucceeded {
            node_id: node_id.to_string(),
            job_id,
        })
        .await;
    }

    /// Mark a node as failed
    async fn mark_node_failed(
        &self,
        graph: &mut PipelineGraph,
        node_id: &str,
        error: String,
        started_at: chrono::DateTime<Utc>,
    ) {
        error!("Task {} failed: {}", node_id, error);
        graph.set_state(
            node_id,
            NodeState::Failed {
                error: error.clone(),
                started_at,
                failed_at: Utc::now(),
            },
        );
        self.emit_event(ExecutionEvent::NodeFailed {
            node_id: node_id.to_string(),
            error,
        })
        .await;
    }
}
