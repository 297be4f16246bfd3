//! Secret Manager REST client

use crate::gcp::{AccessToken, SecretStore, StorageError};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Default Secret Manager endpoint
pub const SECRET_MANAGER_BASE_URL: &str = "https://secretmanager.googleapis.com";

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

/// Reads secret versions with a caller-supplied token
#[derive(Debug, Clone)]
pub struct SecretManagerClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for SecretManagerClient {
    fn default() -> Self {
        Self::new(SECRET_MANAGER_BASE_URL)
    }
}

impl SecretManagerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn access_secret_version(
        &self,
        token: &AccessToken,
        project: &str,
        secret: &str,
        version: &str,
    ) -> Result<Vec<u8>, StorageError> {
        let url = format!(
            "{}/v1/projects/{}/secrets/{}/versions/{}:access",
            self.base_url, project, secret, version
        );
        debug!("Accessing secret {} ({}) in {}", secret, version, project);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::from_status(status.as_u16(), body));
        }

        let parsed: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))?;

        base64::engine::general_purpose::STANDARD
            .decode(parsed.payload.data.as_bytes())
            .map_err(|e| StorageError::Decode(e.to_string()))
    }
}
