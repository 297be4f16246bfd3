//! Test: Stage gating and final status aggregation

use crate::helpers::*;
use chrono::Utc;
use conformance_orchestrator::core::graph::FINAL_STATUS_NODE;
use conformance_orchestrator::core::{NodeState, PipelineGraph, RunStatus};
use conformance_orchestrator::execution::StatusAggregator;
use uuid::Uuid;

const JOB1: &str = "job1_extract_and_enrich";
const JOB2: &str = "job2_transform_and_load_to_gcp";

/// Stage 1 succeeds, stage 2 fails: the run fails naming stage 2
#[tokio::test]
async fn test_stage_two_failure_fails_run() {
    let harness = Harness::with_submitter(ScriptedSubmitter::new().failing(JOB2, "ERROR: Task failed"));

    let completed = harness.run(&request(Some("DEV"))).await.unwrap();

    let failure = completed.result.as_ref().unwrap_err();
    assert_eq!(failure.node, JOB2);
    assert_eq!(failure.state, "FAILED");
    assert_eq!(completed.graph.state.status, RunStatus::Failed);
    assert!(completed
        .graph
        .state
        .failure
        .as_deref()
        .unwrap()
        .contains(JOB2));

    assert!(completed.graph.node(JOB1).unwrap().state.is_success());
    assert!(matches!(
        completed.graph.node(FINAL_STATUS_NODE).unwrap().state,
        NodeState::Failed { .. }
    ));
    assert_eq!(harness.submitter.submitted_ids(), vec![JOB1, JOB2]);
}

/// Stage 2 is never attempted when stage 1 fails, and the aggregator still runs
#[tokio::test]
async fn test_stage_one_failure_blocks_stage_two() {
    let harness = Harness::with_submitter(ScriptedSubmitter::new().failing(JOB1, "ERROR"));

    let completed = harness.run(&request(Some("QA"))).await.unwrap();

    assert_eq!(harness.submitter.submitted_ids(), vec![JOB1]);
    assert!(matches!(
        &completed.graph.node(JOB2).unwrap().state,
        NodeState::UpstreamFailed { upstream } if upstream == JOB1
    ));
    assert!(completed.graph.node(FINAL_STATUS_NODE).unwrap().state.is_terminal());
    assert_eq!(completed.result.unwrap_err().node, JOB1);
}

/// A rejected submission is a node failure, not an error of the run call
#[tokio::test]
async fn test_rejected_submission_is_recorded_on_node() {
    let harness = Harness::with_submitter(ScriptedSubmitter::new().rejecting(JOB1));

    let completed = harness.run(&request(Some("PROD"))).await.unwrap();

    match &completed.graph.node(JOB1).unwrap().state {
        NodeState::Failed { error, .. } => assert!(error.contains("not accepting jobs")),
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(completed.result.unwrap_err().node, JOB1);
    assert_eq!(harness.submitter.submitted_ids(), vec![JOB1]);
}

/// Every node ends terminal and the order is the fixed chain
#[tokio::test]
async fn test_success_chain_order() {
    let harness = Harness::new();

    let completed = harness.run(&request(Some("DEV"))).await.unwrap();

    assert!(completed.graph.is_complete());
    let order: Vec<&str> = completed
        .graph
        .execution_order()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(order, vec![JOB1, JOB2, FINAL_STATUS_NODE]);
    assert!(completed.graph.node(FINAL_STATUS_NODE).unwrap().state.is_success());
}

/// FAILED then SKIPPED: the aggregator names the first non-success node
#[tokio::test]
async fn test_aggregator_names_first_failure() {
    let harness = Harness::new();
    let prepared = harness.orchestrator().prepare(&request(Some("DEV"))).await.unwrap();

    let mut graph: PipelineGraph = prepared.graph;
    graph.set_state(
        JOB1,
        NodeState::Failed {
            error: "boom".to_string(),
            started_at: Utc::now(),
            failed_at: Utc::now(),
        },
    );
    graph.set_state(
        JOB2,
        NodeState::Skipped {
            reason: "skipped by operator".to_string(),
        },
    );

    let failure = StatusAggregator::evaluate(&graph, FINAL_STATUS_NODE).unwrap_err();
    assert_eq!(failure.node, JOB1);
    assert_ne!(graph.state.run_id, Uuid::nil());
}
