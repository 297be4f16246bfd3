//! Database credentials from the secret store

use crate::core::config::ConfigDocument;
use crate::core::context::RunContext;
use crate::core::error::SecretFetchError;
use crate::gcp::{AccessToken, CredentialProvider, SecretStore, StorageError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Secret version read for every credential
pub const LATEST_VERSION: &str = "latest";

/// Database credentials, held in memory for the lifetime of a run
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub host: String,
}

impl Credentials {
    /// Stand-ins used when rendering a plan without touching the secret store
    pub fn placeholder() -> Self {
        Self {
            user: "<DB_USER>".to_string(),
            password: "<DB_PASSWORD>".to_string(),
            host: "<DB_INSTANCE>".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"******")
            .field("host", &self.host)
            .finish()
    }
}

/// Names of the three database secrets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretNames {
    pub user: String,
    pub password: String,
    pub host: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            user: "pdi_prvstrcnf_cloud_sql_user".to_string(),
            password: "pdi_prvstrcnf_cloud_sql_password".to_string(),
            host: "pdi_prvstrcnf_cloud_sql_ip".to_string(),
        }
    }
}

/// Fetches the run's database credentials.
///
/// All three secrets must resolve; the first failure aborts the run.
pub struct SecretResolver {
    store: Arc<dyn SecretStore>,
    credentials: Arc<dyn CredentialProvider>,
    names: SecretNames,
}

impl SecretResolver {
    pub fn new(store: Arc<dyn SecretStore>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            store,
            credentials,
            names: SecretNames::default(),
        }
    }

    pub fn with_names(mut self, names: SecretNames) -> Self {
        self.names = names;
        self
    }

    pub async fn resolve(
        &self,
        context: &RunContext,
        config: &ConfigDocument,
    ) -> Result<Credentials, SecretFetchError> {
        // The identity's own project holds the secrets; fall back to the configured one
        let project = match self.credentials.project_id().await {
            Some(project) => project,
            None => config.settings().project_id.clone(),
        };
        let token = self.credentials.access_token().await?;

        debug!(
            "Fetching {} database credentials from project {}",
            context.environment, project
        );

        let user = self.fetch(&token, &project, &self.names.user).await?;
        let password = self.fetch(&token, &project, &self.names.password).await?;
        let host = self.fetch(&token, &project, &self.names.host).await?;

        info!("Fetched database credentials for {}", context.environment);
        Ok(Credentials { user, password, host })
    }

    async fn fetch(
        &self,
        token: &AccessToken,
        project: &str,
        secret: &str,
    ) -> Result<String, SecretFetchError> {
        let bytes = self
            .store
            .access_secret_version(token, project, secret, LATEST_VERSION)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => SecretFetchError::NotFound {
                    project: project.to_string(),
                    secret: secret.to_string(),
                },
                StorageError::PermissionDenied(_) => SecretFetchError::PermissionDenied {
                    project: project.to_string(),
                    secret: secret.to_string(),
                },
                StorageError::Decode(_) => SecretFetchError::Decode {
                    secret: secret.to_string(),
                },
                StorageError::Auth(auth) => SecretFetchError::Auth(auth),
                other => SecretFetchError::Unavailable {
                    secret: secret.to_string(),
                    reason: other.to_string(),
                },
            })?;

        String::from_utf8(bytes).map_err(|_| SecretFetchError::Decode {
            secret: secret.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            user: "svc".to_string(),
            password: "hunter2".to_string(),
            host: "10.0.0.5".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("svc"));
        assert!(rendered.contains("10.0.0.5"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_default_secret_names() {
        let names = SecretNames::default();
        assert_eq!(names.user, "pdi_prvstrcnf_cloud_sql_user");
        assert_eq!(names.password, "pdi_prvstrcnf_cloud_sql_password");
        assert_eq!(names.host, "pdi_prvstrcnf_cloud_sql_ip");
    }
}
