//! Dataproc job submission against an existing cluster

use crate::core::job::{JobPayload, JobSpec};
use crate::gcp::auth::{ImpersonatedCredentialProvider, IAM_CREDENTIALS_BASE_URL};
use crate::gcp::{AccessToken, CredentialProvider, JobOutcome, JobSubmitter, SubmissionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default Dataproc endpoint
pub const DATAPROC_BASE_URL: &str = "https://dataproc.googleapis.com";

/// Client settings
#[derive(Debug, Clone)]
pub struct DataprocSettings {
    pub base_url: String,
    pub iam_base_url: String,
    /// Delay between job status polls
    pub poll_interval: Duration,
    /// Give up waiting after this long; the job itself keeps running
    pub wait_timeout: Option<Duration>,
}

impl Default for DataprocSettings {
    fn default() -> Self {
        Self {
            base_url: DATAPROC_BASE_URL.to_string(),
            iam_base_url: IAM_CREDENTIALS_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(15),
            wait_timeout: None,
        }
    }
}

impl DataprocSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_iam_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.iam_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobRequest<'a> {
    job: &'a JobPayload,
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    reference: JobReferenceResponse,
    #[serde(default)]
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReferenceResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    state: String,
    #[serde(default)]
    details: Option<String>,
}

/// Classification of a Dataproc job state
#[derive(Debug, Clone, PartialEq, Eq)]
enum Progress {
    Pending,
    Done,
    Failed(String),
}

fn classify(job: &Job) -> Progress {
    let Some(status) = &job.status else {
        return Progress::Pending;
    };
    match status.state.as_str() {
        "DONE" => Progress::Done,
        "ERROR" | "CANCELLED" => Progress::Failed(match &status.details {
            Some(details) => format!("{}: {}", status.state, details),
            None => status.state.clone(),
        }),
        _ => Progress::Pending,
    }
}

/// Submits PySpark jobs and polls them to completion
pub struct DataprocClient {
    http: reqwest::Client,
    settings: DataprocSettings,
    credentials: Arc<dyn CredentialProvider>,
}

impl DataprocClient {
    pub fn new(credentials: Arc<dyn CredentialProvider>, settings: DataprocSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            credentials,
        }
    }

    pub fn settings(&self) -> &DataprocSettings {
        &self.settings
    }

    async fn token_for(&self, spec: &JobSpec) -> Result<AccessToken, SubmissionError> {
        let token = match &spec.impersonation_chain {
            Some(target) if !target.trim().is_empty() => {
                ImpersonatedCredentialProvider::with_base_url(
                    self.credentials.clone(),
                    target.clone(),
                    self.settings.iam_base_url.clone(),
                )
                .access_token()
                .await?
            }
            _ => self.credentials.access_token().await?,
        };
        Ok(token)
    }

    fn jobs_url(&self, spec: &JobSpec) -> String {
        format!(
            "{}/v1/projects/{}/regions/{}/jobs",
            self.settings.base_url, spec.project_id, spec.region
        )
    }

    async fn read_job(response: reqwest::Response) -> Result<Job, SubmissionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| SubmissionError::Malformed(e.to_string()))
    }

    async fn submit_job(&self, spec: &JobSpec, token: &AccessToken) -> Result<Job, SubmissionError> {
        let payload = spec.payload();
        let request = SubmitJobRequest {
            job: &payload,
            request_id: Uuid::new_v4().to_string(),
        };

        let response = self
            .http
            .post(format!("{}:submit", self.jobs_url(spec)))
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| SubmissionError::Http(e.to_string()))?;

        Self::read_job(response).await
    }

    async fn get_job(&self, spec: &JobSpec, job_id: &str) -> Result<Job, SubmissionError> {
        let token = self.token_for(spec).await?;
        let response = self
            .http
            .get(format!("{}/{}", self.jobs_url(spec), job_id))
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| SubmissionError::Http(e.to_string()))?;

        Self::read_job(response).await
    }
}

#[async_trait]
impl JobSubmitter for DataprocClient {
    async fn submit(&self, spec: &JobSpec) -> Result<JobOutcome, SubmissionError> {
        let token = self.token_for(spec).await?;
        let mut job = self.submit_job(spec, &token).await?;
        let job_id = job.reference.job_id.clone();
        info!(
            "Submitted {} as Dataproc job {} on cluster {}",
            spec.task_id, job_id, spec.cluster_name
        );

        let deadline = self.settings.wait_timeout.map(|t| Instant::now() + t);

        loop {
            match classify(&job) {
                Progress::Done => {
                    info!("Dataproc job {} finished", job_id);
                    return Ok(JobOutcome::Succeeded { job_id });
                }
                Progress::Failed(detail) => {
                    warn!("Dataproc job {} failed: {}", job_id, detail);
                    return Ok(JobOutcome::Failed { job_id, detail });
                }
                Progress::Pending => {}
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                let waited = self.settings.wait_timeout.unwrap_or_default().as_secs();
                warn!("Stopped waiting for Dataproc job {} after {}s", job_id, waited);
                return Ok(JobOutcome::Failed {
                    job_id,
                    detail: format!("no terminal state after {}s; the job was left running", waited),
                });
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            job = self.get_job(spec, &job_id).await?;
            debug!(
                "Dataproc job {} state {}",
                job_id,
                job.status.as_ref().map(|s| s.state.as_str()).unwrap_or("UNKNOWN")
            );
        }
    }
}
