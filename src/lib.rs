//! conformance-orchestrator - runs the daily conformance load on an existing Dataproc cluster

pub mod cli;
pub mod core;
pub mod execution;
pub mod gcp;
pub mod persistence;

// Re-export commonly used types
pub use self::core::{
    ConfigDocument, Environment, JobSpec, NodeState, OrchestratorError, PipelineGraph, RunContext,
    RunRequest, RunStatus, RunVariables,
};
pub use execution::{AggregationFailure, ExecutionEngine, ExecutionEvent, Orchestrator};
pub use gcp::{CredentialProvider, JobOutcome, JobSubmitter, ObjectStore, SecretStore};
