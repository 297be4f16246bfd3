//! Test: Configuration and secret failures abort before submission

use crate::helpers::*;
use conformance_orchestrator::core::{ConfigurationError, Environment, SecretFetchError};
use conformance_orchestrator::OrchestratorError;

/// A missing document is fatal and no secret is read
#[tokio::test]
async fn test_missing_document_stops_run() {
    let harness = Harness::with(FakeObjectStore::new(), FakeSecretStore::new(), ScriptedSubmitter::new());

    let err = harness.run(&request(Some("QA"))).await.unwrap_err();

    match err {
        OrchestratorError::Configuration(ConfigurationError::Fetch { bucket, blob, .. }) => {
            assert_eq!(bucket, BUCKET);
            assert_eq!(blob, Environment::Qa.config_blob());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.secrets.calls(), 0);
    assert!(harness.submitter.submitted_ids().is_empty());
}

/// A document missing a required key is fatal
#[tokio::test]
async fn test_malformed_document_stops_run() {
    let mut document: serde_json::Value =
        serde_json::from_str(&config_document(Environment::Dev)).unwrap();
    document["config"].as_object_mut().unwrap().remove("CONNECT_SA");

    let objects = FakeObjectStore::new().with_object(
        BUCKET,
        Environment::Dev.config_blob(),
        document.to_string(),
    );
    let harness = Harness::with(objects, FakeSecretStore::new(), ScriptedSubmitter::new());

    let err = harness.run(&request(Some("DEV"))).await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Configuration(ConfigurationError::Malformed { .. })
    ));
    assert_eq!(harness.secrets.calls(), 0);
}

/// One unreadable secret aborts the run before any job is submitted
#[tokio::test]
async fn test_secret_failure_stops_run() {
    let harness = Harness::with(
        FakeObjectStore::with_all_environments(),
        FakeSecretStore::new().denying("pdi_prvstrcnf_cloud_sql_password"),
        ScriptedSubmitter::new(),
    );

    let err = harness.run(&request(Some("PROD"))).await.unwrap_err();

    match err {
        OrchestratorError::Secret(SecretFetchError::PermissionDenied { project, secret }) => {
            assert_eq!(project, "pdi-secrets");
            assert_eq!(secret, "pdi_prvstrcnf_cloud_sql_password");
        }
        other => panic!("unexpected error: {other}"),
    }
    // user, then password; host is never requested
    assert_eq!(harness.secrets.calls(), 2);
    assert!(harness.submitter.submitted_ids().is_empty());
}

/// A missing host secret is fatal after all three lookups
#[tokio::test]
async fn test_missing_secret_stops_run() {
    let harness = Harness::with(
        FakeObjectStore::with_all_environments(),
        FakeSecretStore::new().missing("pdi_prvstrcnf_cloud_sql_ip"),
        ScriptedSubmitter::new(),
    );

    let err = harness.run(&request(Some("QA"))).await.unwrap_err();

    match err {
        OrchestratorError::Secret(SecretFetchError::NotFound { project, secret }) => {
            assert_eq!(project, "pdi-secrets");
            assert_eq!(secret, "pdi_prvstrcnf_cloud_sql_ip");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.secrets.calls(), 3);
    assert!(harness.submitter.submitted_ids().is_empty());
}

/// A secret payload that is not UTF-8 is a decode failure
#[tokio::test]
async fn test_undecodable_secret_stops_run() {
    let harness = Harness::with(
        FakeObjectStore::with_all_environments(),
        FakeSecretStore::new().with_raw("pdi_prvstrcnf_cloud_sql_user", &[0xff, 0xfe]),
        ScriptedSubmitter::new(),
    );

    let err = harness.run(&request(Some("DEV"))).await.unwrap_err();

    match err {
        OrchestratorError::Secret(SecretFetchError::Decode { secret }) => {
            assert_eq!(secret, "pdi_prvstrcnf_cloud_sql_user");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.secrets.calls(), 1);
    assert!(harness.submitter.submitted_ids().is_empty());
}

/// Secrets come from the identity's project and land in the job arguments
#[tokio::test]
async fn test_credentials_flow_into_arguments() {
    let harness = Harness::new();

    harness.run(&request(Some("DEV"))).await.unwrap();

    assert_eq!(harness.secrets.projects(), vec!["pdi-secrets"; 3]);
    let args = &harness.submitter.submitted_specs()[0].args;
    assert!(args.contains(&format!("--DB_USER={}", DB_USER)));
    assert!(args.contains(&format!("--DB_PASSWORD={}", DB_PASSWORD)));
    assert!(args.contains(&format!("--DB_INSTANCE={}", DB_HOST)));
}

/// Document fields that disagree with the resolved environment are overridden, not fatal
#[tokio::test]
async fn test_inconsistent_document_uses_resolved_environment() {
    // The QA slot holds a document written for DEV
    let objects = FakeObjectStore::new().with_object(
        BUCKET,
        Environment::Qa.config_blob(),
        config_document(Environment::Dev),
    );
    let harness = Harness::with(objects, FakeSecretStore::new(), ScriptedSubmitter::new());

    let completed = harness.run(&request(Some("QA"))).await.unwrap();

    assert!(completed.succeeded());
    let args = &harness.submitter.submitted_specs()[0].args;
    assert_eq!(args[0], "--ENV=QA");
    assert_eq!(args[1], "--DB_NAME=pdi_gcppsql1_db_qa");
}
