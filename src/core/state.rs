//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is currently executing nodes
    Running,
    /// Aggregator observed every node succeeding
    Succeeded,
    /// Aggregator observed a non-success node
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(RunStatus::Pending),
            "RUNNING" => Some(RunStatus::Running),
            "SUCCESS" => Some(RunStatus::Succeeded),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single graph node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Waiting for its dependencies
    Queued,
    /// Submitted and waiting for a terminal signal
    Running {
        started_at: DateTime<Utc>,
    },
    /// Finished successfully
    Success {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        /// Remote job id, when the node submitted one
        job_id: Option<String>,
    },
    /// Ran and failed (remote rejection, remote failure, or aggregation failure)
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Never ran because a strict dependency failed
    UpstreamFailed {
        upstream: String,
    },
    /// Never ran because a strict dependency was skipped
    Skipped {
        reason: String,
    },
}

impl NodeState {
    /// Check if the node is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeState::Queued | NodeState::Running { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NodeState::Success { .. })
    }

    /// Short uppercase label, as reported to operators and stored in history
    pub fn label(&self) -> &'static str {
        match self {
            NodeState::Queued => "QUEUED",
            NodeState::Running { .. } => "RUNNING",
            NodeState::Success { .. } => "SUCCESS",
            NodeState::Failed { .. } => "FAILED",
            NodeState::UpstreamFailed { .. } => "UPSTREAM_FAILED",
            NodeState::Skipped { .. } => "SKIPPED",
        }
    }

    /// Human-readable detail for non-trivial states
    pub fn detail(&self) -> Option<String> {
        match self {
            NodeState::Success { job_id: Some(job_id), .. } => Some(format!("job {}", job_id)),
            NodeState::Failed { error, .. } => Some(error.clone()),
            NodeState::UpstreamFailed { upstream } => Some(format!("upstream {} did not succeed", upstream)),
            NodeState::Skipped { reason } => Some(reason.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Overall run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current run status
    pub status: RunStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When the aggregator finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Aggregator failure message, if the run failed
    pub failure: Option<String>,
}

impl RunState {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            failure: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark run as succeeded
    pub fn complete(&mut self) {
        self.status = RunStatus::Succeeded;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self, reason: String) {
        self.status = RunStatus::Failed;
        self.failure = Some(reason);
        self.completed_at = Some(Utc::now());
    }
}
