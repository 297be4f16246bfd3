//! Per-environment configuration documents

use crate::core::context::RunContext;
use crate::core::error::ConfigurationError;
use crate::gcp::ObjectStore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Owner reported when the document does not name one
pub const DEFAULT_OWNER: &str = "owner";

/// Daily trigger used by the external scheduler
pub const DAILY_SCHEDULE: &str = "0 5 * * *";

/// Pipeline description shown in plans and history
pub const PIPELINE_DESCRIPTION: &str =
    "Runs PySpark jobs on an existing Dataproc cluster (no create/delete).";

/// Descriptive facts about the pipeline; scheduling itself happens elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub dag_id: String,
    pub tags: Vec<String>,
    pub owner: String,
    pub schedule: String,
    pub description: String,
}

/// Pipeline settings under the document's `config` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PipelineSettings {
    pub project_id: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    pub dag_id: String,
    pub dag_tags: Vec<String>,
    /// Service account the job submissions impersonate
    pub connect_sa: String,
    pub environment: String,
    pub db_name: String,
    pub tbl_name: String,
    pub stg_storage_bucket: String,
    pub storage_project_id: String,
    pub blob_name: String,
    pub from_email: String,
    pub to_email: String,
    pub smtp_server: String,
    pub json_config_path: String,
    pub python_file_uris_daily_1: String,
    pub python_file_uris_daily_2: String,
}

/// The pre-existing cluster jobs are placed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub cluster_name: String,
}

/// Document layout as stored
#[derive(Debug, Deserialize)]
struct RawConfigDocument {
    config: PipelineSettings,
    cluster_config: ClusterConfig,
    #[serde(default)]
    region: Option<String>,
}

/// A validated configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigDocument {
    settings: PipelineSettings,
    cluster: ClusterConfig,
    region: String,
}

fn gcs_uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^gs://[a-z0-9][a-z0-9._-]{1,220}[a-z0-9]/\S+$").expect("valid gs:// pattern")
    })
}

fn uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9+.-]*://\S+$").expect("valid URI pattern"))
}

fn non_empty(key: &str, value: &str) -> Result<(), ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::MissingKey(key.to_string()));
    }
    Ok(())
}

impl ConfigDocument {
    /// Parse and validate a document; `blob` is only used in error messages
    pub fn from_json(blob: &str, text: &str) -> Result<Self, ConfigurationError> {
        let raw: RawConfigDocument =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Malformed {
                blob: blob.to_string(),
                reason: e.to_string(),
            })?;

        let region = raw
            .region
            .clone()
            .or_else(|| raw.config.region.clone())
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingKey("region".to_string()))?;

        let document = Self {
            settings: raw.config,
            cluster: raw.cluster_config,
            region,
        };
        document.validate()?;
        Ok(document)
    }

    /// Check required values are present and URIs are well formed
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let s = &self.settings;
        let required = [
            ("PROJECT_ID", &s.project_id),
            ("DAG_ID", &s.dag_id),
            ("CONNECT_SA", &s.connect_sa),
            ("ENVIRONMENT", &s.environment),
            ("DB_NAME", &s.db_name),
            ("TBL_NAME", &s.tbl_name),
            ("STG_STORAGE_BUCKET", &s.stg_storage_bucket),
            ("STORAGE_PROJECT_ID", &s.storage_project_id),
            ("BLOB_NAME", &s.blob_name),
            ("FROM_EMAIL", &s.from_email),
            ("TO_EMAIL", &s.to_email),
            ("SMTP_SERVER", &s.smtp_server),
            ("JSON_CONFIG_PATH", &s.json_config_path),
            ("PYTHON_FILE_URIS_DAILY_1", &s.python_file_uris_daily_1),
            ("PYTHON_FILE_URIS_DAILY_2", &s.python_file_uris_daily_2),
            ("cluster_config.cluster_name", &self.cluster.cluster_name),
        ];
        for (key, value) in required {
            non_empty(key, value)?;
        }

        // The stage scripts load this path themselves and only accept gs:// URIs
        if !gcs_uri_pattern().is_match(&s.json_config_path) {
            return Err(ConfigurationError::InvalidValue {
                key: "JSON_CONFIG_PATH".to_string(),
                value: s.json_config_path.clone(),
                expected: "a gs://bucket/path URI",
            });
        }

        for (key, value) in [
            ("PYTHON_FILE_URIS_DAILY_1", &s.python_file_uris_daily_1),
            ("PYTHON_FILE_URIS_DAILY_2", &s.python_file_uris_daily_2),
        ] {
            if !uri_pattern().is_match(value) {
                return Err(ConfigurationError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                    expected: "a scheme-qualified URI",
                });
            }
        }

        Ok(())
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster.cluster_name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn owner(&self) -> &str {
        self.settings
            .owner_name
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .unwrap_or(DEFAULT_OWNER)
    }

    pub fn metadata(&self) -> PipelineMetadata {
        PipelineMetadata {
            dag_id: self.settings.dag_id.clone(),
            tags: self.settings.dag_tags.clone(),
            owner: self.owner().to_string(),
            schedule: DAILY_SCHEDULE.to_string(),
            description: PIPELINE_DESCRIPTION.to_string(),
        }
    }

    /// Project jobs are submitted to; `GCP_PROJECT` wins over the document
    pub fn target_project<'a>(&'a self, context: &'a RunContext) -> &'a str {
        context
            .project_override
            .as_deref()
            .unwrap_or(&self.settings.project_id)
    }
}

/// Loads the configuration document for a run's environment
pub struct ConfigResolver {
    store: Arc<dyn ObjectStore>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetch and parse the document; any failure is fatal for the run
    pub async fn load(&self, context: &RunContext) -> Result<ConfigDocument, ConfigurationError> {
        let bucket = &context.config_bucket;
        let blob = context.config_blob();
        debug!("Loading configuration gs://{}/{}", bucket, blob);

        let text = self
            .store
            .read_text(bucket, blob)
            .await
            .map_err(|source| ConfigurationError::Fetch {
                bucket: bucket.clone(),
                blob: blob.to_string(),
                source,
            })?;

        let document = ConfigDocument::from_json(blob, &text)?;
        Self::check_consistency(context, &document);

        info!(
            "Loaded configuration for {} (pipeline {}, cluster {} in {})",
            context.environment,
            document.settings.dag_id,
            document.cluster_name(),
            document.region()
        );
        Ok(document)
    }

    fn check_consistency(context: &RunContext, document: &ConfigDocument) {
        let settings = document.settings();
        if !settings.environment.trim().eq_ignore_ascii_case(context.environment.as_str()) {
            warn!(
                "Configuration ENVIRONMENT '{}' differs from resolved environment {}; using {}",
                settings.environment, context.environment, context.environment
            );
        }
        if settings.db_name != context.database_name() {
            warn!(
                "Configuration DB_NAME '{}' differs from {} database '{}'; using '{}'",
                settings.db_name,
                context.environment,
                context.database_name(),
                context.database_name()
            );
        }
    }
}
