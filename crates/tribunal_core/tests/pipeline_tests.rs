//! End-to-end runs of the audit graph with scripted collaborators.
//!
//! No network, no git: evaluators and judges are fakes from `common`.

mod common;

use common::*;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_stream::StreamExt;
use tribunal_common::{AuditError, EvidenceCategory, Flag, OpinionRecord, Persona, ReasonCode, Rule};
use tribunal_core::scheduler::{RunEvent, EVIDENCE_MERGE, OPINION_MERGE, SYNTHESIS};
use tribunal_core::StageStatus;

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_worked_example_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = graph(standard_evaluators(), worked_example_judges())
        .run(input(&dir))
        .await
        .unwrap();

    assert_eq!(outcome.verdict.score, 3.8);
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.verdict.evidence_gaps.is_empty());
    assert!(outcome
        .stage_status
        .values()
        .all(|s| *s == StageStatus::Completed));

    let ids: Vec<&str> = outcome.evidence.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["docs:textual:0", "history:historical:0", "repo:structural:0"]);
    let judges: Vec<&str> = outcome.opinions.iter().map(|o| o.judge_id.as_str()).collect();
    assert_eq!(judges, vec!["defense", "prosecutor", "tech_lead"]);
}

#[tokio::test]
async fn test_security_flagged_evidence_caps_at_three() {
    let dir = tempfile::tempdir().unwrap();
    let evaluators = vec![
        ScriptedEvaluator::new("repo", EvidenceCategory::Structural, json!({ "parallel_fan_out": true }))
            .flagged(Flag::SecurityViolation)
            .arc(),
        ScriptedEvaluator::new("docs", EvidenceCategory::Textual, json!({})).arc(),
    ];

    let outcome = graph(evaluators, worked_example_judges()).run(input(&dir)).await.unwrap();

    assert_eq!(outcome.verdict.score, 3.0);
    let entry = outcome.verdict.applied(Rule::SecurityOverride).unwrap();
    assert!(entry.cites_evidence("repo:structural:0"));
}

#[tokio::test]
async fn test_stage_transitions_are_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = graph(standard_evaluators(), worked_example_judges())
        .run(input(&dir))
        .await
        .unwrap();

    let position = |node: &str, status: StageStatus| {
        outcome
            .trace
            .iter()
            .position(|e| e.node == node && e.status == status)
            .unwrap()
    };
    assert!(position(EVIDENCE_MERGE, StageStatus::Completed) < position("judge.0.prosecutor", StageStatus::Running));
    assert!(position(OPINION_MERGE, StageStatus::Completed) < position(SYNTHESIS, StageStatus::Running));
    assert_eq!(outcome.trace.iter().filter(|e| e.node == SYNTHESIS).count(), 2);
}

// ============================================================================
// Partial Failure
// ============================================================================

#[tokio::test]
async fn test_failing_evaluator_yields_gap_and_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let evaluators = vec![
        ScriptedEvaluator::new("repo", EvidenceCategory::Structural, json!({ "parallel_fan_out": true })).arc(),
        ScriptedEvaluator::failing(
            "history",
            EvidenceCategory::Historical,
            AuditError::tool(ReasonCode::Transport, "git exploded"),
        )
        .arc(),
    ];

    let outcome = graph(evaluators, worked_example_judges()).run(input(&dir)).await.unwrap();

    assert_eq!(outcome.verdict.score, 3.8);
    assert!(outcome.verdict.evidence_gaps.contains(&EvidenceCategory::Historical));
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(outcome.stage_status["evaluator.1.history"], StageStatus::Failed);
    assert_eq!(outcome.stage_status[EVIDENCE_MERGE], StageStatus::Completed);
    assert!(outcome.stage_status.values().all(|s| s.is_terminal()));

    let gap = outcome.evidence.iter().find(|e| e.gap).unwrap();
    assert_eq!(gap.id, "history:historical:gap");
    assert_eq!(gap.gap_reason, Some(ReasonCode::Transport));
}

#[tokio::test]
async fn test_hanging_evaluator_times_out_alone() {
    let dir = tempfile::tempdir().unwrap();
    let evaluators = vec![
        ScriptedEvaluator::new("repo", EvidenceCategory::Structural, json!({})).arc(),
        ScriptedEvaluator::new("docs", EvidenceCategory::Textual, json!({}))
            .delayed(Duration::from_secs(30))
            .arc(),
    ];
    let graph = graph(evaluators, worked_example_judges())
        .with_branch_timeouts(Duration::from_millis(200), Duration::from_secs(5));

    let start = Instant::now();
    let outcome = graph.run(input(&dir)).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(outcome.stage_status["evaluator.0.repo"], StageStatus::Completed);
    assert_eq!(outcome.stage_status["evaluator.1.docs"], StageStatus::Failed);
    assert_eq!(
        outcome.branch_outcomes["evidence/docs"].reason,
        Some(ReasonCode::Timeout)
    );
    assert!(outcome.verdict.evidence_gaps.contains(&EvidenceCategory::Textual));
}

#[tokio::test]
async fn test_panicking_branch_becomes_gap() {
    let dir = tempfile::tempdir().unwrap();
    let evaluators = vec![
        ScriptedEvaluator::new("repo", EvidenceCategory::Structural, json!({})).arc(),
        ScriptedEvaluator::panicking("history", EvidenceCategory::Historical).arc(),
    ];

    let outcome = graph(evaluators, worked_example_judges()).run(input(&dir)).await.unwrap();

    let gap = outcome.evidence.iter().find(|e| e.producer_id == "history").unwrap();
    assert_eq!(gap.gap_reason, Some(ReasonCode::Panicked));
    assert!(gap.payload["detail"].as_str().unwrap().contains("exploded"));
}

#[tokio::test]
async fn test_slow_judge_times_out_alone() {
    let dir = tempfile::tempdir().unwrap();
    let judges = vec![
        ScriptedJudge::new("prosecutor", Persona::Adversarial, 2.0).arc(),
        ScriptedJudge::new("defense", Persona::Optimistic, 5.0)
            .delayed(Duration::from_secs(30))
            .arc(),
        ScriptedJudge::new("tech_lead", Persona::Pragmatic, 4.0).arc(),
    ];
    let graph = graph(standard_evaluators(), judges)
        .with_branch_timeouts(Duration::from_secs(5), Duration::from_millis(200));

    let outcome = graph.run(input(&dir)).await.unwrap();

    let defense = outcome.opinions.iter().find(|o| o.judge_id == "defense").unwrap();
    assert!(defense.gap);
    assert_eq!(defense.gap_reason, Some(ReasonCode::Timeout));
    // (2 + 2*4) / 3
    assert_eq!(outcome.verdict.score, 3.3);
}

// ============================================================================
// Producer Identity
// ============================================================================

#[tokio::test]
async fn test_duplicate_producer_fails_only_that_branch() {
    let dir = tempfile::tempdir().unwrap();
    let evaluators = vec![
        ScriptedEvaluator::new("repo", EvidenceCategory::Structural, json!({ "typed_state": true })).arc(),
        ScriptedEvaluator::new("repo", EvidenceCategory::Structural, json!({ "typed_state": false })).arc(),
        ScriptedEvaluator::new("docs", EvidenceCategory::Textual, json!({})).arc(),
    ];

    let outcome = graph(evaluators, worked_example_judges()).run(input(&dir)).await.unwrap();

    let statuses = [
        outcome.stage_status["evaluator.0.repo"],
        outcome.stage_status["evaluator.1.repo"],
    ];
    assert_eq!(statuses.iter().filter(|s| **s == StageStatus::Failed).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StageStatus::Completed).count(), 1);
    assert_eq!(outcome.stage_status["evaluator.2.docs"], StageStatus::Completed);
    assert_eq!(outcome.evidence.iter().filter(|e| e.producer_id == "repo").count(), 1);
    assert!(outcome.verdict.score > 0.0);
}

#[tokio::test]
async fn test_records_claiming_other_producer_become_gap() {
    let dir = tempfile::tempdir().unwrap();
    let forged = record("docs", EvidenceCategory::Textual, json!({}));
    let evaluators = vec![
        ScriptedEvaluator::with_records("repo", EvidenceCategory::Structural, vec![forged]).arc(),
    ];

    let outcome = graph(evaluators, worked_example_judges()).run(input(&dir)).await.unwrap();

    assert_eq!(outcome.evidence.len(), 1);
    assert_eq!(outcome.evidence[0].id, "repo:structural:gap");
    assert_eq!(outcome.evidence[0].gap_reason, Some(ReasonCode::SchemaInvalid));
}

#[tokio::test]
async fn test_overlapping_namespaces_degrade_to_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let mut squatter = record("repo:structural", EvidenceCategory::Structural, json!({ "typed_state": true }));
    squatter.producer_id = "repo".to_string();
    let evaluators = vec![
        ScriptedEvaluator::with_records("repo", EvidenceCategory::Structural, vec![squatter]).arc(),
        ScriptedEvaluator::new("repo:structural", EvidenceCategory::Structural, json!({ "typed_state": true })).arc(),
        ScriptedEvaluator::new("docs", EvidenceCategory::Textual, json!({})).arc(),
    ];

    let outcome = graph(evaluators, worked_example_judges()).run(input(&dir)).await.unwrap();

    assert_eq!(outcome.stage_status["evaluator.0.repo"], StageStatus::Failed);
    assert_eq!(outcome.stage_status["evaluator.1.repo:structural"], StageStatus::Failed);
    assert_eq!(outcome.stage_status["evaluator.2.docs"], StageStatus::Completed);
    assert_eq!(outcome.stage_status[SYNTHESIS], StageStatus::Completed);

    let gaps: Vec<(&str, Option<ReasonCode>)> = outcome
        .evidence
        .iter()
        .filter(|e| e.gap)
        .map(|e| (e.id.as_str(), e.gap_reason))
        .collect();
    assert_eq!(
        gaps,
        vec![
            ("repo:structural:gap", Some(ReasonCode::SchemaInvalid)),
            ("repo:structural:structural:gap", Some(ReasonCode::SchemaInvalid)),
        ]
    );
    assert!(!outcome.evidence.iter().any(|e| e.id == "repo:structural:structural:0"));
    assert_eq!(outcome.verdict.evidence_gaps.iter().collect::<Vec<_>>(), vec![&EvidenceCategory::Structural]);
    assert_eq!(outcome.exit_code(), 2);
}

// ============================================================================
// Fact Supremacy
// ============================================================================

#[tokio::test]
async fn test_contradicted_judge_is_overruled() {
    let dir = tempfile::tempdir().unwrap();
    let liar = OpinionRecord::new("defense", Persona::Optimistic, 5.0)
        .with_claim("repo:structural:0", "parallel_fan_out", false)
        .with_argument("no fan-out anywhere, but I like it");
    let judges = vec![
        ScriptedJudge::new("prosecutor", Persona::Adversarial, 2.0).arc(),
        ScriptedJudge::from_opinion(liar).arc(),
        ScriptedJudge::new("tech_lead", Persona::Pragmatic, 4.0).arc(),
    ];

    let outcome = graph(standard_evaluators(), judges).run(input(&dir)).await.unwrap();

    let entry = outcome.verdict.applied(Rule::FactSupremacy).unwrap();
    assert!(entry.cites_evidence("repo:structural:0"));
    assert!(!entry.cites_opinion("defense"));
    assert_eq!(entry.overruled, vec!["defense".to_string()]);
    // (2 + 2*4) / 3
    assert_eq!(outcome.verdict.score, 3.3);
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn test_verdict_json_identical_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let graph = graph(standard_evaluators(), worked_example_judges());

    let first = graph.run(input(&dir)).await.unwrap();
    let second = graph.run(input(&dir)).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        serde_json::to_string(&first.verdict).unwrap(),
        serde_json::to_string(&second.verdict).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.evidence).unwrap(),
        serde_json::to_string(&second.evidence).unwrap()
    );
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_stream_emits_each_stage_then_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let graph = graph(standard_evaluators(), worked_example_judges());
    let node_count = graph.layout().nodes().len();

    let events: Vec<RunEvent> = graph.stream(input(&dir)).collect().await;

    assert_eq!(events.len(), node_count + 1);
    let stage_events = events
        .iter()
        .filter(|e| matches!(e, RunEvent::StageCompleted { .. }))
        .count();
    assert_eq!(stage_events, node_count);

    match events.last().unwrap() {
        RunEvent::Finished(outcome) => assert_eq!(outcome.verdict.score, 3.8),
        other => panic!("expected Finished, got {:?}", other),
    }

    // snapshots only grow
    let mut seen = 0;
    for event in &events {
        if let RunEvent::StageCompleted { snapshot, .. } = event {
            let size = snapshot.evidence.len() + snapshot.opinions.len();
            assert!(size >= seen);
            seen = size;
        }
    }
}

#[tokio::test]
async fn test_empty_bench_is_incomplete_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = graph(standard_evaluators(), vec![]).run(input(&dir)).await.unwrap();

    assert_eq!(outcome.verdict.score, 1.0);
    assert!(outcome.verdict.caveat.is_some());
    assert_eq!(outcome.stage_status[OPINION_MERGE], StageStatus::Completed);
}
