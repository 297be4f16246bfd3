//! Test utility functions for conformance-orchestrator

#![allow(dead_code)]

use async_trait::async_trait;
use conformance_orchestrator::core::context::BUCKET_VARIABLE;
use conformance_orchestrator::core::environment::EnvironmentSources;
use conformance_orchestrator::core::{Environment, JobSpec, RunRequest, RunVariables};
use conformance_orchestrator::execution::{CompletedRun, ExecutionEngine, Orchestrator};
use conformance_orchestrator::gcp::{
    AccessToken, JobOutcome, JobSubmitter, ObjectStore, SecretStore, StaticCredentialProvider,
    StorageError, SubmissionError,
};
use conformance_orchestrator::OrchestratorError;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Bucket named by the run variables in every scenario
pub const BUCKET: &str = "composer-config-bucket";

pub const DB_USER: &str = "svc_conformance";
pub const DB_PASSWORD: &str = "s3cret-password";
pub const DB_HOST: &str = "10.20.30.40";

/// Object store backed by a map, counting reads
#[derive(Default)]
pub struct FakeObjectStore {
    objects: HashMap<(String, String), String>,
    requested: Mutex<Vec<String>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, bucket: &str, blob: &str, text: impl Into<String>) -> Self {
        self.objects
            .insert((bucket.to_string(), blob.to_string()), text.into());
        self
    }

    /// A store holding a valid document for every environment
    pub fn with_all_environments() -> Self {
        Environment::ALL.into_iter().fold(Self::new(), |store, env| {
            store.with_object(BUCKET, env.config_blob(), config_document(env))
        })
    }

    pub fn reads(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub fn requested_blobs(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn read_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError> {
        self.requested.lock().unwrap().push(blob.to_string());
        self.objects
            .get(&(bucket.to_string(), blob.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("gs://{}/{}", bucket, blob)))
    }
}

/// Secret store with fixed values, counting calls
pub struct FakeSecretStore {
    secrets: HashMap<String, Vec<u8>>,
    denied: Option<String>,
    calls: AtomicUsize,
    projects: Mutex<Vec<String>>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        let secrets = [
            ("pdi_prvstrcnf_cloud_sql_user", DB_USER),
            ("pdi_prvstrcnf_cloud_sql_password", DB_PASSWORD),
            ("pdi_prvstrcnf_cloud_sql_ip", DB_HOST),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
        .collect();

        Self {
            secrets,
            denied: None,
            calls: AtomicUsize::new(0),
            projects: Mutex::new(Vec::new()),
        }
    }

    /// Deny access to one secret
    pub fn denying(mut self, secret: &str) -> Self {
        self.denied = Some(secret.to_string());
        self
    }

    /// Drop one secret so reading it reports not found
    pub fn missing(mut self, secret: &str) -> Self {
        self.secrets.remove(secret);
        self
    }

    /// Serve raw payload bytes for one secret
    pub fn with_raw(mut self, secret: &str, bytes: &[u8]) -> Self {
        self.secrets.insert(secret.to_string(), bytes.to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn projects(&self) -> Vec<String> {
        self.projects.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn access_secret_version(
        &self,
        _token: &AccessToken,
        project: &str,
        secret: &str,
        version: &str,
    ) -> Result<Vec<u8>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.projects.lock().unwrap().push(project.to_string());
        assert_eq!(version, "latest");

        if self.denied.as_deref() == Some(secret) {
            return Err(StorageError::PermissionDenied(secret.to_string()));
        }
        self.secrets
            .get(secret)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(secret.to_string()))
    }
}

/// Submitter returning scripted outcomes; unscripted jobs succeed
#[derive(Default)]
pub struct ScriptedSubmitter {
    outcomes: HashMap<String, JobOutcome>,
    rejected: Vec<String>,
    submitted: Mutex<Vec<JobSpec>>,
}

impl ScriptedSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, task_id: &str, detail: &str) -> Self {
        self.outcomes.insert(
            task_id.to_string(),
            JobOutcome::Failed {
                job_id: format!("{}-job", task_id),
                detail: detail.to_string(),
            },
        );
        self
    }

    pub fn rejecting(mut self, task_id: &str) -> Self {
        self.rejected.push(task_id.to_string());
        self
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.task_id.clone())
            .collect()
    }

    pub fn submitted_specs(&self) -> Vec<JobSpec> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobSubmitter for ScriptedSubmitter {
    async fn submit(&self, spec: &JobSpec) -> Result<JobOutcome, SubmissionError> {
        self.submitted.lock().unwrap().push(spec.clone());

        if self.rejected.contains(&spec.task_id) {
            return Err(SubmissionError::Rejected {
                status: 400,
                body: "cluster is not accepting jobs".to_string(),
            });
        }

        Ok(self
            .outcomes
            .get(&spec.task_id)
            .cloned()
            .unwrap_or_else(|| JobOutcome::Succeeded {
                job_id: format!("{}-job", spec.task_id),
            }))
    }
}

/// A valid configuration document whose fields agree with `env`
pub fn config_document(env: Environment) -> String {
    json!({
        "config": {
            "PROJECT_ID": "pdi-conformance",
            "REGION": "us-east4",
            "DAG_ID": "prv_rstr_cnf_reports",
            "DAG_TAGS": ["conformance", "reports"],
            "CONNECT_SA": "connect@pdi-conformance.iam.gserviceaccount.com",
            "ENVIRONMENT": env.as_str(),
            "DB_NAME": env.database_name(),
            "TBL_NAME": "conformance_daily",
            "STG_STORAGE_BUCKET": "stg-conformance",
            "STORAGE_PROJECT_ID": "pdi-storage",
            "BLOB_NAME": "reports/daily.csv",
            "FROM_EMAIL": "noreply@example.com",
            "TO_EMAIL": "team@example.com",
            "SMTP_SERVER": "smtp.example.com",
            "JSON_CONFIG_PATH": "gs://composer-config-bucket/dags/prv_rstr_cnf_reports/job.json",
            "PYTHON_FILE_URIS_DAILY_1": "gs://composer-config-bucket/scripts/job1.py",
            "PYTHON_FILE_URIS_DAILY_2": "gs://composer-config-bucket/scripts/job2.py"
        },
        "cluster_config": { "cluster_name": "shared-conformance-cluster" }
    })
    .to_string()
}

/// A request with an explicit environment value (or none) and the bucket variable
pub fn request(env: Option<&str>) -> RunRequest {
    let sources = match env {
        Some(value) => EnvironmentSources::new().with_explicit(value),
        None => EnvironmentSources::new(),
    };
    RunRequest::new(sources, RunVariables::new().with(BUCKET_VARIABLE, BUCKET))
}

/// Fakes wired into an orchestrator and an engine
pub struct Harness {
    pub objects: Arc<FakeObjectStore>,
    pub secrets: Arc<FakeSecretStore>,
    pub submitter: Arc<ScriptedSubmitter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(
            FakeObjectStore::with_all_environments(),
            FakeSecretStore::new(),
            ScriptedSubmitter::new(),
        )
    }

    pub fn with(objects: FakeObjectStore, secrets: FakeSecretStore, submitter: ScriptedSubmitter) -> Self {
        Self {
            objects: Arc::new(objects),
            secrets: Arc::new(secrets),
            submitter: Arc::new(submitter),
        }
    }

    pub fn with_submitter(submitter: ScriptedSubmitter) -> Self {
        Self::with(
            FakeObjectStore::with_all_environments(),
            FakeSecretStore::new(),
            submitter,
        )
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.objects.clone(),
            self.secrets.clone(),
            Arc::new(StaticCredentialProvider::new(
                "test-token",
                Some("pdi-secrets".to_string()),
            )),
        )
    }

    pub fn engine(&self) -> ExecutionEngine<Arc<ScriptedSubmitter>> {
        ExecutionEngine::new(self.submitter.clone())
    }

    pub async fn run(&self, request: &RunRequest) -> Result<CompletedRun, OrchestratorError> {
        self.orchestrator().run(request, &self.engine()).await
    }
}
