//! Deployment environment and its resolution order

use crate::core::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Environment used when no source supplies one
pub const DEFAULT_ENVIRONMENT: Environment = Environment::Dev;

/// A deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Dev,
    Qa,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Qa, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "DEV",
            Environment::Qa => "QA",
            Environment::Prod => "PROD",
        }
    }

    /// Blob path of this environment's configuration document
    pub fn config_blob(&self) -> &'static str {
        match self {
            Environment::Dev => "dags/prv_rstr_cnf_reports/Dev/config/conformance_load_config_dev.json",
            Environment::Qa => "dags/prv_rstr_cnf_reports/QA/config/conformance_load_config_QA.json",
            Environment::Prod => "dags/prv_rstr_cnf_reports/PROD/config/conformance_load_config_prod.json",
        }
    }

    /// Cloud SQL database the jobs load into
    pub fn database_name(&self) -> &'static str {
        match self {
            Environment::Dev => "pdi_gcppsql1_db_dev",
            Environment::Qa => "pdi_gcppsql1_db_qa",
            Environment::Prod => "pdi_gcppsql1_db",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == normalized)
            .ok_or(ConfigurationError::InvalidEnvironment { value: normalized })
    }
}

/// Where the resolved environment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentSource {
    /// `--env` on the command line
    Explicit,
    /// `ENV` set by the orchestrator in the process environment
    Orchestrator,
    /// `ENV` in the persisted run variables
    Persisted,
    /// Nothing supplied a value
    Fallback,
}

/// Candidate environment values, highest priority first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSources {
    pub explicit: Option<String>,
    pub orchestrator: Option<String>,
    pub persisted: Option<String>,
}

impl EnvironmentSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_explicit(mut self, value: impl Into<String>) -> Self {
        self.explicit = Some(value.into());
        self
    }

    pub fn with_orchestrator(mut self, value: impl Into<String>) -> Self {
        self.orchestrator = Some(value.into());
        self
    }

    pub fn with_persisted(mut self, value: impl Into<String>) -> Self {
        self.persisted = Some(value.into());
        self
    }

    /// The highest-priority non-blank value, with its source
    pub fn selected(&self) -> (Option<&str>, EnvironmentSource) {
        let candidates = [
            (self.explicit.as_deref(), EnvironmentSource::Explicit),
            (self.orchestrator.as_deref(), EnvironmentSource::Orchestrator),
            (self.persisted.as_deref(), EnvironmentSource::Persisted),
        ];

        candidates
            .into_iter()
            .find_map(|(value, source)| {
                value
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (Some(v), source))
            })
            .unwrap_or((None, EnvironmentSource::Fallback))
    }

    /// Resolve the environment.
    ///
    /// A value supplied by a higher-priority source is never skipped in favour
    /// of a lower one: if it is invalid, resolution fails.
    pub fn resolve(&self) -> Result<Environment, ConfigurationError> {
        let (value, source) = self.selected();
        let environment = match value {
            Some(raw) => raw.parse()?,
            None => DEFAULT_ENVIRONMENT,
        };

        debug!("Environment source: {:?}", source);
        info!("Resolved ENV: {}", environment);
        Ok(environment)
    }
}
