//! Branch wrappers.
//!
//! A branch runs in its own task under a wall-clock limit. Whatever happens
//! inside (error, timeout, panic, malformed records) the wrapper hands back a
//! `BranchUpdate`, so a failing branch never reaches its siblings.

use crate::context::AuditContext;
use crate::evaluators::Evaluator;
use crate::judges::Judge;
use crate::state::{BranchOutcome, BranchRecords, BranchUpdate, EvidenceSet};
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use tribunal_common::{AuditError, EvidenceRecord, OpinionRecord, ReasonCode, Schema};

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "branch panicked".to_string()
    }
}

/// Spawned branch body, aborted on drop
struct BranchTask<T>(JoinHandle<T>);

impl<T> Drop for BranchTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Await a branch task, aborting it when `limit` passes
async fn guard<T>(mut task: BranchTask<Result<T, AuditError>>, limit: Duration) -> Result<T, AuditError> {
    match timeout(limit, &mut task.0).await {
        Err(_) => Err(AuditError::tool(ReasonCode::Timeout, format!("branch exceeded {:?}", limit))),
        Ok(Err(join)) if join.is_panic() => Err(AuditError::tool(ReasonCode::Panicked, panic_message(join.into_panic()))),
        Ok(Err(join)) => Err(AuditError::tool(ReasonCode::Panicked, join.to_string())),
        Ok(Ok(result)) => result,
    }
}

/// Producer and judge ids are a single namespace segment
pub fn check_producer_id(id: &str) -> Result<(), AuditError> {
    if id.is_empty() || id.contains(':') {
        return Err(AuditError::SchemaInvalid(format!(
            "producer id '{}' must be non-empty and free of ':'",
            id
        )));
    }
    Ok(())
}

/// Records must be well formed and belong to `producer`. Ids have the shape
/// `{producer}:{category}:{suffix}` with a single-segment suffix.
pub fn check_evidence(producer: &str, records: Vec<EvidenceRecord>) -> Result<Vec<EvidenceRecord>, AuditError> {
    check_producer_id(producer)?;
    if records.is_empty() {
        return Err(AuditError::SchemaInvalid(format!("evaluator '{}' returned no records", producer)));
    }

    let mut ids = BTreeSet::new();
    for record in &records {
        record.validate()?;
        if record.producer_id != producer {
            return Err(AuditError::SchemaInvalid(format!(
                "record '{}' claims producer '{}', branch is '{}'",
                record.id, record.producer_id, producer
            )));
        }
        let prefix = format!("{}:{}:", producer, record.category);
        let in_namespace = record
            .id
            .strip_prefix(&prefix)
            .is_some_and(|suffix| !suffix.is_empty() && !suffix.contains(':'));
        if !in_namespace {
            return Err(AuditError::SchemaInvalid(format!(
                "record id '{}' outside namespace '{}'",
                record.id, prefix
            )));
        }
        if !ids.insert(record.id.as_str()) {
            return Err(AuditError::SchemaInvalid(format!("record id '{}' repeated", record.id)));
        }
        if !record.gap {
            Schema::evidence_payload(record.category).validate(&record.payload)?;
        }
    }
    Ok(records)
}

pub async fn run_evaluator(
    node: String,
    evaluator: Arc<dyn Evaluator>,
    ctx: Arc<AuditContext>,
    limit: Duration,
) -> BranchUpdate {
    let producer = evaluator.id().to_string();
    let category = evaluator.category();

    let result = match check_producer_id(&producer) {
        Err(e) => Err(e),
        Ok(()) => {
            let task = evaluator.clone();
            let handle = BranchTask(tokio::spawn(async move { task.evaluate(&ctx).await }));
            guard(handle, limit).await.and_then(|records| check_evidence(&producer, records))
        }
    };

    match result {
        Ok(records) => {
            debug!("{} produced {} record(s)", node, records.len());
            BranchUpdate {
                producer_id: producer,
                records: BranchRecords::Evidence(records),
                outcome: BranchOutcome::completed(node),
            }
        }
        Err(e) => {
            let reason = e.reason_code();
            warn!("{} degraded to gap ({}): {}", node, reason, e);
            BranchUpdate {
                records: BranchRecords::Evidence(vec![EvidenceRecord::gap(
                    producer.as_str(),
                    category,
                    reason,
                    e.to_string(),
                )]),
                producer_id: producer,
                outcome: BranchOutcome::failed(node, reason, e.to_string()),
            }
        }
    }
}

fn check_opinion(judge_id: &str, opinion: OpinionRecord) -> Result<OpinionRecord, AuditError> {
    opinion.validate()?;
    if opinion.judge_id != judge_id {
        return Err(AuditError::SchemaInvalid(format!(
            "opinion claims judge '{}', branch is '{}'",
            opinion.judge_id, judge_id
        )));
    }
    Ok(opinion)
}

pub async fn run_judge(node: String, judge: Arc<dyn Judge>, evidence: EvidenceSet, limit: Duration) -> BranchUpdate {
    let judge_id = judge.id().to_string();
    let persona = judge.persona();

    let result = match check_producer_id(&judge_id) {
        Err(e) => Err(e),
        Ok(()) => {
            let task = judge.clone();
            let handle = BranchTask(tokio::spawn(async move { task.judge(&evidence).await }));
            guard(handle, limit).await.and_then(|opinion| check_opinion(&judge_id, opinion))
        }
    };

    match result {
        Ok(opinion) => {
            // a gap opinion commits normally but marks the branch FAILED
            let outcome = match opinion.gap_reason {
                Some(reason) if opinion.gap => BranchOutcome::failed(node, reason, opinion.argument.clone()),
                _ => BranchOutcome::completed(node),
            };
            BranchUpdate {
                producer_id: judge_id,
                records: BranchRecords::Opinions(vec![opinion]),
                outcome,
            }
        }
        Err(e) => {
            let reason = e.reason_code();
            warn!("{} degraded to gap ({}): {}", node, reason, e);
            BranchUpdate {
                records: BranchRecords::Opinions(vec![
                    OpinionRecord::gap(judge_id.as_str(), persona, reason).with_argument(e.to_string())
                ]),
                producer_id: judge_id,
                outcome: BranchOutcome::failed(node, reason, e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tribunal_common::EvidenceCategory;

    fn structural(id: &str, producer: &str) -> EvidenceRecord {
        EvidenceRecord::new(
            id,
            producer,
            EvidenceCategory::Structural,
            json!({ "capabilities": { "typed_state": true }, "files_scanned": 4 }),
            0.9,
        )
    }

    #[test]
    fn test_check_evidence_accepts_own_records() {
        let records = check_evidence("repo", vec![structural("repo:structural:0", "repo")]).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_foreign_producer_is_schema_invalid() {
        let err = check_evidence("repo", vec![structural("repo:structural:0", "docs")]).unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::SchemaInvalid);
    }

    #[test]
    fn test_payload_checked_against_category() {
        let bad = EvidenceRecord::new(
            "repo:structural:0",
            "repo",
            EvidenceCategory::Structural,
            json!({ "capabilities": { "typed_state": "yes" } }),
            0.9,
        );
        let err = check_evidence("repo", vec![bad]).unwrap_err();
        assert!(err.to_string().contains("$.files_scanned"));
    }

    #[test]
    fn test_namespace_includes_category() {
        let wrong_category = structural("repo:historical:0", "repo");
        assert!(check_evidence("repo", vec![wrong_category]).is_err());

        // reads as `repo:structural` + `structural:0`, the other producer's id
        let nested = structural("repo:structural:structural:0", "repo");
        let err = check_evidence("repo", vec![nested]).unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::SchemaInvalid);

        assert!(check_evidence("repo", vec![structural("repo:structural:", "repo")]).is_err());
    }

    #[test]
    fn test_producer_id_is_one_segment() {
        assert!(check_producer_id("repo").is_ok());
        assert!(check_producer_id("repo:structural").is_err());
        assert!(check_producer_id("").is_err());

        let err = check_evidence("repo:structural", vec![structural("repo:structural:structural:0", "repo:structural")])
            .unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::SchemaInvalid);
    }

    #[test]
    fn test_empty_and_repeated_rejected() {
        assert!(check_evidence("repo", vec![]).is_err());
        let twice = vec![structural("repo:structural:0", "repo"), structural("repo:structural:0", "repo")];
        assert!(check_evidence("repo", twice).is_err());
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    struct SlowEvaluator {
        id: &'static str,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Evaluator for SlowEvaluator {
        fn id(&self) -> &str {
            self.id
        }

        fn category(&self) -> EvidenceCategory {
            EvidenceCategory::Structural
        }

        async fn evaluate(&self, _ctx: &AuditContext) -> Result<Vec<EvidenceRecord>, AuditError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(vec![structural("repo:structural:0", "repo")])
        }
    }

    fn slow(id: &'static str) -> (Arc<dyn Evaluator>, Arc<AtomicBool>) {
        let finished = Arc::new(AtomicBool::new(false));
        let evaluator = SlowEvaluator {
            id,
            finished: finished.clone(),
        };
        (Arc::new(evaluator), finished)
    }

    #[tokio::test]
    async fn test_aborted_branch_cancels_its_task() {
        let (evaluator, finished) = slow("repo");
        let ctx = Arc::new(AuditContext::for_path("run", std::env::temp_dir()));

        let mut branches = tokio::task::JoinSet::new();
        branches.spawn(run_evaluator("evaluator.0.repo".into(), evaluator, ctx, Duration::from_secs(5)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        branches.abort_all();
        assert!(branches.join_next().await.unwrap().unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_timed_out_branch_cancels_its_task() {
        let (evaluator, finished) = slow("repo");
        let ctx = Arc::new(AuditContext::for_path("run", std::env::temp_dir()));

        let update = run_evaluator("evaluator.0.repo".into(), evaluator, ctx, Duration::from_millis(10)).await;
        assert_eq!(update.outcome.reason, Some(ReasonCode::Timeout));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_multi_segment_producer_degrades_without_running() {
        let (evaluator, finished) = slow("repo:structural");
        let ctx = Arc::new(AuditContext::for_path("run", std::env::temp_dir()));

        let update = run_evaluator("evaluator.0.repo:structural".into(), evaluator, ctx, Duration::from_secs(5)).await;
        assert_eq!(update.outcome.reason, Some(ReasonCode::SchemaInvalid));
        match update.records {
            BranchRecords::Evidence(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].id, "repo:structural:structural:gap");
            }
            BranchRecords::Opinions(_) => panic!("expected evidence"),
        }
        assert!(!finished.load(Ordering::SeqCst));
    }
}
