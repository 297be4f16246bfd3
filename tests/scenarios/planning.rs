//! Test: Planning resolves everything except secrets and submits nothing

use crate::helpers::*;
use conformance_orchestrator::core::NodeKind;

#[tokio::test]
async fn test_plan_uses_placeholders() {
    let harness = Harness::new();

    let plan = harness.orchestrator().plan(&request(Some("prod"))).await.unwrap();

    assert_eq!(harness.secrets.calls(), 0);
    assert!(harness.submitter.submitted_ids().is_empty());

    let specs = plan.graph.job_specs();
    assert_eq!(specs.len(), 2);
    assert!(specs[0].args.contains(&"--DB_PASSWORD=<DB_PASSWORD>".to_string()));
    assert_eq!(specs[1].args.last().unwrap(), "--STEP=publish_to_gcp");

    let metadata = plan.metadata();
    assert_eq!(metadata.dag_id, "prv_rstr_cnf_reports");
    assert_eq!(metadata.tags, vec!["conformance", "reports"]);
    assert_eq!(metadata.owner, "owner");
    assert_eq!(metadata.schedule, "0 5 * * *");
}

/// Job specs are identical across repeated preparations
#[tokio::test]
async fn test_prepared_specs_are_deterministic() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();

    let first = orchestrator.prepare(&request(Some("QA"))).await.unwrap();
    let second = orchestrator.prepare(&request(Some("QA"))).await.unwrap();

    assert_ne!(first.context.run_id, second.context.run_id);
    assert_eq!(first.graph.job_specs(), second.graph.job_specs());

    for node in first.graph.nodes() {
        if let NodeKind::Job(spec) = &node.kind {
            assert_eq!(
                spec.impersonation_chain.as_deref(),
                Some("connect@pdi-conformance.iam.gserviceaccount.com")
            );
            assert_eq!(spec.args.len(), if node.id.starts_with("job1") { 14 } else { 15 });
        }
    }
}
