//! Object stores holding configuration documents

use crate::gcp::{CredentialProvider, ObjectStore, StorageError};
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default Cloud Storage JSON API endpoint
pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Cloud Storage via the JSON API
pub struct GcsObjectStore {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl GcsObjectStore {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_base_url(credentials, GCS_BASE_URL)
    }

    pub fn with_base_url(credentials: Arc<dyn CredentialProvider>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    /// Media download URL; the object name is a single encoded path segment
    fn object_url(&self, bucket: &str, blob: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::Http(format!("Invalid storage URL {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| StorageError::Http(format!("Invalid storage URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", blob]);
        url.query_pairs_mut().append_pair("alt", "media");

        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn read_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError> {
        let url = self.object_url(bucket, blob)?;
        let token = self.credentials.access_token().await?;
        debug!("GET gs://{}/{}", bucket, blob);

        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::from_status(status.as_u16(), body));
        }

        response
            .text()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))
    }
}

/// Directory-backed store laid out as `<root>/<bucket>/<blob>`
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, blob: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(bucket).join(blob);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::PermissionDenied(format!(
                "object path escapes store root: {}/{}",
                bucket, blob
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn read_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError> {
        let path = self.object_path(bucket, blob)?;
        debug!("Reading {}", path.display());

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
