//! Error types for Google Cloud collaborators

use thiserror::Error;

/// Failure to obtain an access token
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Credential command failed: {0}")]
    Command(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Token endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected token response: {0}")]
    Parse(String),
}

/// Failure to read an object or a secret payload
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl StorageError {
    /// Map a non-success HTTP status to the matching variant
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => StorageError::NotFound(body),
            401 | 403 => StorageError::PermissionDenied(body),
            _ => StorageError::Api { status, body },
        }
    }
}

/// Failure to submit a job or to follow it to a terminal state
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Dataproc rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected Dataproc response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
