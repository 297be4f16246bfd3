//! CLI command definitions

use crate::core::{ConfigurationError, RunRequest, RunVariables};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Where a run's environment and variables come from
#[derive(Debug, Args, Clone)]
pub struct TargetArgs {
    /// Environment to run in (DEV, QA or PROD, any case); wins over $ENV
    #[arg(short, long)]
    pub env: Option<String>,

    /// Run variables file (YAML); defaults to the user config directory
    #[arg(long)]
    pub variables: Option<PathBuf>,

    /// Variable overrides (key=value)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,

    /// Read configuration documents from <DIR>/<bucket>/<blob> instead of Cloud Storage
    #[arg(long)]
    pub local_store: Option<PathBuf>,
}

impl TargetArgs {
    /// Load the variables file and apply `--var` overrides
    pub fn load_variables(&self) -> Result<RunVariables, ConfigurationError> {
        let mut variables = match (&self.variables, RunVariables::default_path()) {
            (Some(path), _) => RunVariables::load(path, true)?,
            (None, Some(path)) => RunVariables::load(&path, false)?,
            (None, None) => RunVariables::new(),
        };

        for (key, value) in &self.vars {
            variables.set(key.clone(), value.clone());
        }
        Ok(variables)
    }

    pub fn to_request(&self) -> Result<RunRequest, ConfigurationError> {
        Ok(RunRequest::from_process(self.env.clone(), self.load_variables()?))
    }
}

/// Run the pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Seconds between job status polls
    #[arg(long, default_value_t = 15)]
    pub poll_interval_secs: u64,

    /// Stop waiting for a job after this many seconds and mark it failed
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Show what a run would submit, without fetching secrets or submitting
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run in detail
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
