//! Test: Environment selection drives the document, database and job arguments

use crate::helpers::*;
use conformance_orchestrator::core::environment::EnvironmentSources;
use conformance_orchestrator::core::{ConfigurationError, RunRequest, RunStatus, RunVariables};
use conformance_orchestrator::OrchestratorError;

const PROD_BLOB: &str = "dags/prv_rstr_cnf_reports/PROD/config/conformance_load_config_prod.json";
const QA_BLOB: &str = "dags/prv_rstr_cnf_reports/QA/config/conformance_load_config_QA.json";
const DEV_BLOB: &str = "dags/prv_rstr_cnf_reports/Dev/config/conformance_load_config_dev.json";

/// Explicit PROD loads the PROD document and targets the production database
#[tokio::test]
async fn test_prod_override_runs_against_production() {
    let harness = Harness::new();

    let completed = harness.run(&request(Some("PROD"))).await.unwrap();

    assert_eq!(harness.objects.requested_blobs(), vec![PROD_BLOB]);
    assert!(completed.succeeded());
    assert_eq!(completed.graph.state.status, RunStatus::Succeeded);

    let specs = harness.submitter.submitted_specs();
    assert_eq!(specs.len(), 2);
    for spec in &specs {
        assert_eq!(spec.args[0], "--ENV=PROD");
        assert_eq!(spec.args[1], "--DB_NAME=pdi_gcppsql1_db");
        assert_eq!(spec.cluster_name, "shared-conformance-cluster");
        assert_eq!(spec.region, "us-east4");
    }
}

/// Environment values are case-insensitive
#[tokio::test]
async fn test_lowercase_qa_selects_qa_document() {
    let harness = Harness::new();

    let completed = harness.run(&request(Some("qa"))).await.unwrap();

    assert_eq!(harness.objects.requested_blobs(), vec![QA_BLOB]);
    assert!(completed.succeeded());
    assert!(harness.submitter.submitted_specs()[0]
        .args
        .contains(&"--DB_NAME=pdi_gcppsql1_db_qa".to_string()));
}

/// An unknown environment stops the run before any external access
#[tokio::test]
async fn test_unknown_environment_fails_before_any_access() {
    let harness = Harness::new();

    let err = harness.run(&request(Some("STAGING"))).await.unwrap_err();

    match err {
        OrchestratorError::Configuration(ConfigurationError::InvalidEnvironment { value }) => {
            assert_eq!(value, "STAGING")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.objects.reads(), 0);
    assert_eq!(harness.secrets.calls(), 0);
    assert!(harness.submitter.submitted_ids().is_empty());
}

/// With no value anywhere the run falls back to DEV
#[tokio::test]
async fn test_no_environment_defaults_to_dev() {
    let harness = Harness::new();

    let completed = harness.run(&request(None)).await.unwrap();

    assert_eq!(harness.objects.requested_blobs(), vec![DEV_BLOB]);
    assert_eq!(completed.context.database_name(), "pdi_gcppsql1_db_dev");
}

/// The explicit value beats the process and persisted values
#[tokio::test]
async fn test_priority_order() {
    let harness = Harness::new();
    let variables = RunVariables::new()
        .with("BUCKET_NAME_ENV", BUCKET)
        .with("ENV", "DEV");

    let sources = EnvironmentSources::new()
        .with_explicit("prod")
        .with_orchestrator("qa")
        .with_persisted("dev");
    harness
        .run(&RunRequest::new(sources, variables.clone()))
        .await
        .unwrap();

    let sources = EnvironmentSources::new()
        .with_explicit("  ")
        .with_orchestrator("qa")
        .with_persisted("dev");
    harness
        .run(&RunRequest::new(sources, variables))
        .await
        .unwrap();

    assert_eq!(harness.objects.requested_blobs(), vec![PROD_BLOB, QA_BLOB]);
}

/// An invalid higher-priority value is never skipped in favour of a valid lower one
#[tokio::test]
async fn test_invalid_explicit_value_is_not_skipped() {
    let harness = Harness::new();
    let sources = EnvironmentSources::new()
        .with_explicit("preprod")
        .with_orchestrator("PROD");

    let err = harness
        .run(&RunRequest::new(
            sources,
            RunVariables::new().with("BUCKET_NAME_ENV", BUCKET),
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Configuration(ConfigurationError::InvalidEnvironment { .. })
    ));
    assert_eq!(harness.objects.reads(), 0);
}

/// The configuration bucket must be supplied by the run variables
#[tokio::test]
async fn test_missing_bucket_variable() {
    let harness = Harness::new();

    let err = harness
        .run(&RunRequest::new(
            EnvironmentSources::new().with_explicit("DEV"),
            RunVariables::new(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Configuration(ConfigurationError::MissingVariable(ref key)) if key == "BUCKET_NAME_ENV"
    ));
    assert_eq!(harness.objects.reads(), 0);
}

/// GCP_PROJECT overrides the document's project for job submission
#[tokio::test]
async fn test_project_override_targets_other_project() {
    let harness = Harness::new();

    harness
        .run(&request(Some("DEV")).with_project_override("other-project"))
        .await
        .unwrap();

    for spec in harness.submitter.submitted_specs() {
        assert_eq!(spec.project_id, "other-project");
    }
}
