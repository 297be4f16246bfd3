//! PySpark job specifications for the two pipeline stages

use crate::core::config::ConfigDocument;
use crate::core::context::RunContext;
use crate::core::secrets::Credentials;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Argument keys whose values never leave the process in logs or plans
const SENSITIVE_ARGS: &[&str] = &["--DB_PASSWORD="];

/// Step argument that tells the second stage to publish its output
pub const PUBLISH_STEP_ARG: &str = "--STEP=publish_to_gcp";

/// The two processing stages, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ExtractAndEnrich,
    TransformAndLoad,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::ExtractAndEnrich, Stage::TransformAndLoad];

    pub fn task_id(&self) -> &'static str {
        match self {
            Stage::ExtractAndEnrich => "job1_extract_and_enrich",
            Stage::TransformAndLoad => "job2_transform_and_load_to_gcp",
        }
    }

    /// Entry script for this stage
    pub fn entry_script<'a>(&self, config: &'a ConfigDocument) -> &'a str {
        match self {
            Stage::ExtractAndEnrich => &config.settings().python_file_uris_daily_1,
            Stage::TransformAndLoad => &config.settings().python_file_uris_daily_2,
        }
    }

    /// Arguments appended after the shared base arguments
    pub fn extra_args(&self, config: &ConfigDocument) -> Vec<String> {
        let config_path = format!("--JSON_CONFIG_PATH={}", config.settings().json_config_path);
        match self {
            Stage::ExtractAndEnrich => vec![config_path],
            Stage::TransformAndLoad => vec![config_path, PUBLISH_STEP_ARG.to_string()],
        }
    }
}

/// Everything needed to submit one job to the existing cluster
#[derive(Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub task_id: String,
    pub project_id: String,
    pub region: String,
    pub cluster_name: String,
    pub main_python_file_uri: String,
    pub args: Vec<String>,
    /// Service account to impersonate when submitting
    pub impersonation_chain: Option<String>,
}

impl JobSpec {
    /// Arguments with sensitive values masked
    pub fn redacted_args(&self) -> Vec<String> {
        self.args.iter().map(|arg| redact_arg(arg)).collect()
    }

    /// Dataproc job resource for this spec
    pub fn payload(&self) -> JobPayload {
        JobPayload {
            reference: JobReference {
                project_id: self.project_id.clone(),
                job_id: None,
            },
            placement: JobPlacement {
                cluster_name: self.cluster_name.clone(),
            },
            pyspark_job: PySparkJob {
                main_python_file_uri: self.main_python_file_uri.clone(),
                args: self.args.clone(),
            },
        }
    }
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("task_id", &self.task_id)
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("cluster_name", &self.cluster_name)
            .field("main_python_file_uri", &self.main_python_file_uri)
            .field("args", &self.redacted_args())
            .field("impersonation_chain", &self.impersonation_chain)
            .finish()
    }
}

/// Mask the value of a sensitive `--KEY=value` argument
pub fn redact_arg(arg: &str) -> String {
    match SENSITIVE_ARGS.iter().find(|prefix| arg.starts_with(*prefix)) {
        Some(prefix) => format!("{}******", prefix),
        None => arg.to_string(),
    }
}

/// Dataproc `Job` resource (submission subset)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub reference: JobReference,
    pub placement: JobPlacement,
    pub pyspark_job: PySparkJob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPlacement {
    pub cluster_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PySparkJob {
    pub main_python_file_uri: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Builds job specs from a run's configuration and credentials.
///
/// Construction is pure: the same inputs always give the same argument list.
pub struct JobSpecBuilder<'a> {
    context: &'a RunContext,
    config: &'a ConfigDocument,
    credentials: &'a Credentials,
}

impl<'a> JobSpecBuilder<'a> {
    pub fn new(context: &'a RunContext, config: &'a ConfigDocument, credentials: &'a Credentials) -> Self {
        Self {
            context,
            config,
            credentials,
        }
    }

    /// Arguments shared by every stage, in their fixed order
    pub fn base_args(&self) -> Vec<String> {
        let s = self.config.settings();
        vec![
            format!("--ENV={}", self.context.environment),
            format!("--DB_NAME={}", self.context.database_name()),
            format!("--TBL_NAME={}", s.tbl_name),
            format!("--GCS_BUCKET={}", s.stg_storage_bucket),
            format!("--STORAGE_PROJECT_ID={}", s.storage_project_id),
            format!("--BLOB_NAME={}", s.blob_name),
            format!("--DB_USER={}", self.credentials.user),
            format!("--DB_PASSWORD={}", self.credentials.password),
            format!("--DB_INSTANCE={}", self.credentials.host),
            format!("--FROM_EMAIL={}", s.from_email),
            format!("--TO_EMAIL={}", s.to_email),
            format!("--SMTP_SERVER={}", s.smtp_server),
            format!("--JSON_CONFIG_PATH={}", s.json_config_path),
        ]
    }

    /// Build a spec for an arbitrary entry script; `extra_args` are appended verbatim
    pub fn build(&self, task_id: &str, main_uri: &str, extra_args: &[String]) -> JobSpec {
        let mut args = self.base_args();
        args.extend(extra_args.iter().cloned());

        JobSpec {
            task_id: task_id.to_string(),
            project_id: self.config.target_project(self.context).to_string(),
            region: self.config.region().to_string(),
            cluster_name: self.config.cluster_name().to_string(),
            main_python_file_uri: main_uri.to_string(),
            args,
            impersonation_chain: Some(self.config.settings().connect_sa.clone()),
        }
    }

    pub fn build_stage(&self, stage: Stage) -> JobSpec {
        self.build(
            stage.task_id(),
            stage.entry_script(self.config),
            &stage.extra_args(self.config),
        )
    }
}
