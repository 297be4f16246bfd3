//! Google Cloud collaborators
//!
//! The orchestration core only talks to these traits; tests substitute fakes
//! and the binary wires in the REST clients.

pub mod auth;
pub mod dataproc;
pub mod error;
pub mod secret_manager;
pub mod storage;

use crate::core::JobSpec;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use auth::{GcloudCredentialProvider, ImpersonatedCredentialProvider, StaticCredentialProvider};
pub use dataproc::{DataprocClient, DataprocSettings};
pub use error::{AuthError, StorageError, SubmissionError};
pub use secret_manager::SecretManagerClient;
pub use storage::{GcsObjectStore, LocalObjectStore};

/// OAuth2 bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(******)")
    }
}

/// Source of access tokens for Google APIs
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, AuthError>;

    /// Project the identity belongs to, when known
    async fn project_id(&self) -> Option<String> {
        None
    }
}

/// Read-only access to configuration blobs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError>;
}

/// Read access to secret payloads
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn access_secret_version(
        &self,
        token: &AccessToken,
        project: &str,
        secret: &str,
        version: &str,
    ) -> Result<Vec<u8>, StorageError>;
}

/// Terminal outcome of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { job_id: String },
    Failed { job_id: String, detail: String },
}

/// Submits a job and waits for it to reach a terminal state
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, spec: &JobSpec) -> Result<JobOutcome, SubmissionError>;
}

#[async_trait]
impl<T: JobSubmitter + ?Sized> JobSubmitter for Arc<T> {
    async fn submit(&self, spec: &JobSpec) -> Result<JobOutcome, SubmissionError> {
        (**self).submit(spec).await
    }
}
