//! End-to-end run: resolve, configure, fetch credentials, build, execute

use crate::core::{
    config::PipelineMetadata,
    job::Stage,
    secrets::SecretNames,
    ConfigDocument, ConfigResolver, Credentials, JobSpecBuilder, OrchestratorError, PipelineGraph,
    RunContext, RunRequest, SecretResolver,
};
use crate::execution::{aggregator::AggregationFailure, engine::ExecutionEngine};
use crate::gcp::{CredentialProvider, JobSubmitter, ObjectStore, SecretStore};
use std::sync::Arc;
use tracing::info;

/// Everything needed to execute a run, before anything is submitted
#[derive(Debug)]
pub struct PreparedRun {
    pub context: RunContext,
    pub config: ConfigDocument,
    pub graph: PipelineGraph,
}

impl PreparedRun {
    pub fn metadata(&self) -> PipelineMetadata {
        self.config.metadata()
    }
}

/// A finished run and the aggregator's verdict
#[derive(Debug)]
pub struct CompletedRun {
    pub context: RunContext,
    pub config: ConfigDocument,
    pub graph: PipelineGraph,
    pub result: Result<(), AggregationFailure>,
}

impl CompletedRun {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Wires the resolvers together for one invocation at a time
pub struct Orchestrator {
    config: ConfigResolver,
    secrets: SecretResolver,
}

impl Orchestrator {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            config: ConfigResolver::new(objects),
            secrets: SecretResolver::new(secrets, credentials),
        }
    }

    pub fn with_secret_names(mut self, names: SecretNames) -> Self {
        self.secrets = self.secrets.with_names(names);
        self
    }

    /// Resolve the environment, load configuration and fetch credentials.
    ///
    /// Each step runs only if the previous one succeeded, so an invalid
    /// environment never reaches the object store and a bad document never
    /// reaches the secret store.
    pub async fn prepare(&self, request: &RunRequest) -> Result<PreparedRun, OrchestratorError> {
        let context = RunContext::resolve(request)?;
        let config = self.config.load(&context).await?;
        let credentials = self.secrets.resolve(&context, &config).await?;
        Self::assemble(context, config, &credentials)
    }

    /// Like `prepare`, but with placeholder credentials and no secret access
    pub async fn plan(&self, request: &RunRequest) -> Result<PreparedRun, OrchestratorError> {
        let context = RunContext::resolve(request)?;
        let config = self.config.load(&context).await?;
        Self::assemble(context, config, &Credentials::placeholder())
    }

    fn assemble(
        context: RunContext,
        config: ConfigDocument,
        credentials: &Credentials,
    ) -> Result<PreparedRun, OrchestratorError> {
        let builder = JobSpecBuilder::new(&context, &config, credentials);
        let stage_one = builder.build_stage(Stage::ExtractAndEnrich);
        let stage_two = builder.build_stage(Stage::TransformAndLoad);

        let graph = PipelineGraph::conformance(
            config.settings().dag_id.clone(),
            context.run_id,
            stage_one,
            stage_two,
        )?;

        Ok(PreparedRun {
            context,
            config,
            graph,
        })
    }

    /// Prepare and execute a run.
    ///
    /// Preparation errors are returned as `Err`; once the graph exists the
    /// run always completes and the verdict lives in `CompletedRun::result`.
    pub async fn run<S: JobSubmitter>(
        &self,
        request: &RunRequest,
        engine: &ExecutionEngine<S>,
    ) -> Result<CompletedRun, OrchestratorError> {
        let PreparedRun {
            context,
            config,
            mut graph,
        } = self.prepare(request).await?;

        info!(
            "Executing {} in {} on cluster {}",
            graph.name,
            context.environment,
            config.cluster_name()
        );
        let result = engine.execute(&mut graph).await;

        Ok(CompletedRun {
            context,
            config,
            graph,
            result,
        })
    }
}
