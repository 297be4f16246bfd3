//! Run variables and the per-invocation run context

use crate::core::environment::{Environment, EnvironmentSources};
use crate::core::error::ConfigurationError;
use chrono::{DateTime, Utc};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Run variable naming the bucket that holds configuration documents
pub const BUCKET_VARIABLE: &str = "BUCKET_NAME_ENV";

/// Environment name, both as a process variable and a run variable
pub const ENV_VARIABLE: &str = "ENV";

/// Process variable overriding the configured target project
pub const PROJECT_OVERRIDE_VARIABLE: &str = "GCP_PROJECT";

/// Persisted key/value variables shared by every run
///
/// Loaded from a flat YAML mapping:
///
/// ```yaml
/// BUCKET_NAME_ENV: us-east4-composer-bucket
/// ENV: QA
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunVariables {
    values: BTreeMap<String, String>,
}

impl RunVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse variables from YAML; scalars are rendered as strings
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }

        let raw: BTreeMap<String, Value> = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        let mut values = BTreeMap::new();

        for (key, value) in raw {
            let rendered = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => continue,
                _ => return Err(format!("variable '{}' must be a scalar", key)),
            };
            values.insert(key, rendered);
        }

        Ok(Self { values })
    }

    /// Load variables from a file.
    ///
    /// A missing file is an empty set unless `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigurationError> {
        let variables_error = |reason: String| ConfigurationError::Variables {
            path: path.display().to_string(),
            reason,
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                debug!("No run variables at {}", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(variables_error(e.to_string())),
        };

        Self::from_yaml(&content).map_err(variables_error)
    }

    /// Default variables file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("conformance-orchestrator").join("variables.yaml"))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a variable that must be present and non-blank
    pub fn require(&self, key: &str) -> Result<&str, ConfigurationError> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingVariable(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a caller supplies to start a run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub environment: EnvironmentSources,
    pub variables: RunVariables,
    pub project_override: Option<String>,
}

impl RunRequest {
    pub fn new(environment: EnvironmentSources, variables: RunVariables) -> Self {
        Self {
            environment,
            variables,
            project_override: None,
        }
    }

    /// Build a request from the process environment.
    ///
    /// `ENV` and `GCP_PROJECT` are read here and nowhere else.
    pub fn from_process(explicit_env: Option<String>, variables: RunVariables) -> Self {
        let mut environment = EnvironmentSources::new();
        environment.explicit = explicit_env;
        environment.orchestrator = std::env::var(ENV_VARIABLE).ok();
        environment.persisted = variables.get(ENV_VARIABLE).map(str::to_string);

        Self {
            environment,
            variables,
            project_override: std::env::var(PROJECT_OVERRIDE_VARIABLE)
                .ok()
                .filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn with_project_override(mut self, project: impl Into<String>) -> Self {
        self.project_override = Some(project.into());
        self
    }
}

/// Immutable facts about one invocation, passed by reference to every component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub environment: Environment,
    pub config_bucket: String,
    pub project_override: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(environment: Environment, config_bucket: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            environment,
            config_bucket: config_bucket.into(),
            project_override: None,
            created_at: Utc::now(),
        }
    }

    /// Resolve the environment and configuration bucket for a request
    pub fn resolve(request: &RunRequest) -> Result<Self, ConfigurationError> {
        let environment = request.environment.resolve()?;
        let bucket = request.variables.require(BUCKET_VARIABLE)?;

        let mut context = Self::new(environment, bucket);
        context.project_override = request.project_override.clone();

        info!(
            "Run {} targets {} (config bucket {})",
            context.run_id, context.environment, context.config_bucket
        );
        Ok(context)
    }

    pub fn config_blob(&self) -> &'static str {
        self.environment.config_blob()
    }

    pub fn database_name(&self) -> &'static str {
        self.environment.database_name()
    }
}
