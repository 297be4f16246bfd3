//! Test: Completed runs are summarised for history without credentials

use crate::helpers::*;
use conformance_orchestrator::core::RunStatus;
use conformance_orchestrator::persistence::{create_summary, InMemoryPersistence, PersistenceBackend};

#[tokio::test]
async fn test_failed_run_summary() {
    let harness = Harness::with_submitter(
        ScriptedSubmitter::new().failing("job2_transform_and_load_to_gcp", "ERROR: driver exited"),
    );
    let completed = harness.run(&request(Some("QA"))).await.unwrap();

    let summary = create_summary(&completed);
    assert_eq!(summary.run_id, completed.context.run_id);
    assert_eq!(summary.pipeline_id, "prv_rstr_cnf_reports");
    assert_eq!(summary.environment, "QA");
    assert_eq!(summary.status, RunStatus::Failed);
    assert!(summary.completed_at.is_some());

    let states: Vec<(&str, &str)> = summary
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.state.as_str()))
        .collect();
    assert_eq!(
        states,
        vec![
            ("job1_extract_and_enrich", "SUCCESS"),
            ("job2_transform_and_load_to_gcp", "FAILED"),
            ("final_status", "FAILED"),
        ]
    );

    let rendered = serde_json::to_string(&summary).unwrap();
    assert!(!rendered.contains(DB_PASSWORD));

    let store = InMemoryPersistence::new();
    store.save_run(&summary).await.unwrap();
    let loaded = store.load_run(summary.run_id).await.unwrap().unwrap();
    assert_eq!(loaded.nodes, summary.nodes);
}
