//! Core domain models for an orchestration run
//!
//! This module defines the environment, configuration, credentials, job
//! specifications and the pipeline graph that an execution engine drives.

pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod graph;
pub mod job;
pub mod secrets;
pub mod state;

pub use config::{ConfigDocument, ConfigResolver, PipelineMetadata};
pub use context::{RunContext, RunRequest, RunVariables};
pub use environment::{Environment, EnvironmentSources};
pub use error::{ConfigurationError, OrchestratorError, SecretFetchError};
pub use graph::{Gate, GraphError, JoinPolicy, Node, NodeKind, PipelineGraph};
pub use job::{JobSpec, JobSpecBuilder, Stage};
pub use secrets::{Credentials, SecretResolver};
pub use state::*;
