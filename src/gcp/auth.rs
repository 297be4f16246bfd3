//! Credential providers

use crate::gcp::{AccessToken, AuthError, CredentialProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Scope requested for impersonated tokens
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Default IAM Credentials API endpoint
pub const IAM_CREDENTIALS_BASE_URL: &str = "https://iamcredentials.googleapis.com";

/// Process variable holding a pre-issued access token
pub const TOKEN_VARIABLE: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Process variable naming the identity's project
pub const PROJECT_VARIABLE: &str = "GOOGLE_CLOUD_PROJECT";

/// Provider returning a fixed token
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    token: AccessToken,
    project_id: Option<String>,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            token: AccessToken::new(token),
            project_id,
        }
    }

    /// Build from `GOOGLE_OAUTH_ACCESS_TOKEN` and `GOOGLE_CLOUD_PROJECT`, if a token is set
    pub fn from_env() -> Option<Self> {
        let token = std::env::var(TOKEN_VARIABLE).ok().filter(|t| !t.trim().is_empty())?;
        let project = std::env::var(PROJECT_VARIABLE).ok().filter(|p| !p.trim().is_empty());
        Some(Self::new(token.trim(), project))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        Ok(self.token.clone())
    }

    async fn project_id(&self) -> Option<String> {
        self.project_id.clone()
    }
}

/// Provider that asks the gcloud CLI for the active account's token
#[derive(Debug, Clone)]
pub struct GcloudCredentialProvider {
    gcloud_path: String,
    timeout_secs: u64,
}

impl Default for GcloudCredentialProvider {
    fn default() -> Self {
        Self::new("gcloud".to_string(), 60)
    }
}

impl GcloudCredentialProvider {
    pub fn new(gcloud_path: String, timeout_secs: u64) -> Self {
        Self {
            gcloud_path,
            timeout_secs,
        }
    }

    pub fn gcloud_path(&self) -> &str {
        &self.gcloud_path
    }

    /// Run gcloud and return trimmed stdout
    async fn run(&self, args: &[&str]) -> Result<String, AuthError> {
        debug!("Running {} {}", self.gcloud_path, args.join(" "));

        let output = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.gcloud_path)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AuthError::Timeout(self.timeout_secs))?
        .map_err(|e| AuthError::Command(format!("Failed to execute {}: {}", self.gcloud_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("gcloud exited with code {}: {}", exit_code, stderr.trim());
            return Err(AuthError::Command(format!(
                "gcloud exited with code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| AuthError::Parse(format!("Failed to decode gcloud output: {}", e)))?;
        Ok(stdout.trim().to_string())
    }
}

#[async_trait]
impl CredentialProvider for GcloudCredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let token = self.run(&["auth", "print-access-token"]).await?;
        if token.is_empty() {
            return Err(AuthError::Parse("gcloud returned an empty token".to_string()));
        }
        Ok(AccessToken::new(token))
    }

    async fn project_id(&self) -> Option<String> {
        match self.run(&["config", "get-value", "project"]).await {
            Ok(project) if !project.is_empty() && project != "(unset)" => Some(project),
            Ok(_) => None,
            Err(e) => {
                debug!("No gcloud project: {}", e);
                None
            }
        }
    }
}

#[derive(Serialize)]
struct GenerateAccessTokenRequest<'a> {
    scope: [&'a str; 1],
    lifetime: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
}

/// Provider that exchanges a base token for one of a target service account
pub struct ImpersonatedCredentialProvider {
    base: Arc<dyn CredentialProvider>,
    target: String,
    http: reqwest::Client,
    base_url: String,
}

impl ImpersonatedCredentialProvider {
    pub fn new(base: Arc<dyn CredentialProvider>, target: impl Into<String>) -> Self {
        Self::with_base_url(base, target, IAM_CREDENTIALS_BASE_URL)
    }

    pub fn with_base_url(
        base: Arc<dyn CredentialProvider>,
        target: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base,
            target: target.into(),
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl CredentialProvider for ImpersonatedCredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let base_token = self.base.access_token().await?;
        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:generateAccessToken",
            self.base_url, self.target
        );
        debug!("Impersonating {}", self.target);

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, base_token.bearer())
            .json(&GenerateAccessTokenRequest {
                scope: [CLOUD_PLATFORM_SCOPE],
                lifetime: "3600s",
            })
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateAccessTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))?;
        Ok(AccessToken::new(parsed.access_token))
    }

    async fn project_id(&self) -> Option<String> {
        self.base.project_id().await
    }
}
