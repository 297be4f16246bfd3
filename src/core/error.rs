//! Error taxonomy for an orchestration run
//!
//! Configuration and secret errors abort the run before anything is
//! submitted. Submission failures never surface here: they are recorded as
//! node states and only escalate through the aggregator.

use crate::core::graph::GraphError;
use crate::execution::aggregator::AggregationFailure;
use crate::gcp::{AuthError, StorageError};
use thiserror::Error;

/// Invalid environment, missing variables, or an unusable configuration document
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid environment: {value}. Expected one of DEV, QA, PROD")]
    InvalidEnvironment { value: String },

    #[error("Run variable '{0}' is not set")]
    MissingVariable(String),

    #[error("Failed to read run variables from {path}: {reason}")]
    Variables { path: String, reason: String },

    #[error("Failed to fetch configuration document gs://{bucket}/{blob}: {source}")]
    Fetch {
        bucket: String,
        blob: String,
        #[source]
        source: StorageError,
    },

    #[error("Malformed configuration document {blob}: {reason}")]
    Malformed { blob: String, reason: String },

    #[error("Configuration key '{0}' is missing or empty")]
    MissingKey(String),

    #[error("Configuration key '{key}' must be {expected}, got '{value}'")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Any of the database secrets could not be read
#[derive(Debug, Error)]
pub enum SecretFetchError {
    #[error("Secret '{secret}' not found in project '{project}'")]
    NotFound { project: String, secret: String },

    #[error("Permission denied reading secret '{secret}' in project '{project}'")]
    PermissionDenied { project: String, secret: String },

    #[error("Secret '{secret}' is not valid UTF-8 text")]
    Decode { secret: String },

    #[error("Failed to fetch secret '{secret}': {reason}")]
    Unavailable { secret: String, reason: String },

    #[error("Could not obtain credentials for secret access: {0}")]
    Auth(#[from] AuthError),
}

/// Top-level error of an orchestration run
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Secret(#[from] SecretFetchError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Aggregation(#[from] AggregationFailure),
}
