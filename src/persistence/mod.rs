//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{PipelineMetadata, RunStatus};
use crate::execution::CompletedRun;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Final state of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    /// State label, e.g. `SUCCESS` or `UPSTREAM_FAILED`
    pub state: String,
    pub detail: Option<String>,
}

/// Summary of a finished run; never contains credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// DAG id of the pipeline
    pub pipeline_id: String,

    /// Resolved environment
    pub environment: String,

    pub status: RunStatus,

    /// Aggregator failure message
    pub failure: Option<String>,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Node outcomes in declaration order
    pub nodes: Vec<NodeSummary>,

    pub metadata: PipelineMetadata,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// Most recent runs first
    async fn list_runs(&self, limit: usize) -> Result<Vec<RunSummary>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs.values().cloned().collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);
        Ok(result)
    }
}

/// Create a summary from a completed run
pub fn create_summary(run: &CompletedRun) -> RunSummary {
    let state = &run.graph.state;
    RunSummary {
        run_id: state.run_id,
        pipeline_id: run.graph.name.clone(),
        environment: run.context.environment.to_string(),
        status: state.status,
        failure: state.failure.clone(),
        started_at: state.started_at.unwrap_or(run.context.created_at),
        completed_at: state.completed_at,
        nodes: run
            .graph
            .nodes()
            .iter()
            .map(|node| NodeSummary {
                id: node.id.clone(),
                state: node.state.label().to_string(),
                detail: node.state.detail(),
            })
            .collect(),
        metadata: run.config.metadata(),
    }
}
