//! Run state owned by the scheduler.
//!
//! Fields only change through their reducers, and only the scheduler commits.
//! Branches hand back a `BranchUpdate`; `RunState::commit` lands all of it
//! or none of it.

pub mod reducers;
pub mod snapshot;

pub use reducers::{AppendByProducer, Batch, InsertIfAbsent, Produced, Reducer};
pub use snapshot::{StageEvent, StateSnapshot};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use tribunal_common::{AuditError, EvidenceCategory, EvidenceRecord, OpinionRecord, ReasonCode};

pub const EVIDENCE_FIELD: &str = "evidence";
pub const OPINIONS_FIELD: &str = "opinions";
pub const OUTCOMES_FIELD: &str = "branch_outcomes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Transitions are monotonic: nothing returns to PENDING and terminal is final
    pub fn can_become(&self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// How one branch finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutcome {
    pub node: String,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BranchOutcome {
    pub fn completed(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            status: StageStatus::Completed,
            reason: None,
            detail: None,
        }
    }

    pub fn failed(node: impl Into<String>, reason: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            status: StageStatus::Failed,
            reason: Some(reason),
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BranchRecords {
    Evidence(Vec<EvidenceRecord>),
    Opinions(Vec<OpinionRecord>),
}

impl BranchRecords {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Evidence(_) => EVIDENCE_FIELD,
            Self::Opinions(_) => OPINIONS_FIELD,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Evidence(items) => items.len(),
            Self::Opinions(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Private write buffer of one branch, committed when the branch joins
#[derive(Debug, Clone)]
pub struct BranchUpdate {
    pub producer_id: String,
    pub records: BranchRecords,
    pub outcome: BranchOutcome,
}

impl BranchUpdate {
    /// Key of this branch in `branch_outcomes`
    pub fn outcome_key(&self) -> String {
        format!("{}/{}", self.records.field(), self.producer_id)
    }
}

/// Frozen evidence view, ordered by record id
#[derive(Debug, Clone, Default)]
pub struct EvidenceSet {
    records: BTreeMap<String, Arc<EvidenceRecord>>,
}

impl EvidenceSet {
    pub fn from_records(records: impl IntoIterator<Item = EvidenceRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.id.clone(), Arc::new(r)))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceRecord> {
        self.records.get(id).map(Arc::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvidenceRecord> {
        self.records.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Categories that only have gap records
    pub fn gap_categories(&self) -> BTreeSet<EvidenceCategory> {
        let completed: BTreeSet<_> = self.iter().filter(|r| !r.gap).map(|r| r.category).collect();
        self.iter()
            .filter(|r| r.gap && !completed.contains(&r.category))
            .map(|r| r.category)
            .collect()
    }

    pub fn to_vec(&self) -> Vec<EvidenceRecord> {
        self.iter().cloned().collect()
    }
}

/// Frozen opinion view, ordered by judge id
#[derive(Debug, Clone, Default)]
pub struct OpinionSet {
    records: BTreeMap<String, Arc<OpinionRecord>>,
}

impl OpinionSet {
    pub fn from_records(records: impl IntoIterator<Item = OpinionRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.judge_id.clone(), Arc::new(r)))
                .collect(),
        }
    }

    pub fn get(&self, judge_id: &str) -> Option<&OpinionRecord> {
        self.records.get(judge_id).map(Arc::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpinionRecord> {
        self.records.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_vec(&self) -> Vec<OpinionRecord> {
        self.iter().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct RunState {
    evidence: AppendByProducer<EvidenceRecord>,
    opinions: AppendByProducer<OpinionRecord>,
    branch_outcomes: InsertIfAbsent<BranchOutcome>,
    stage_status: BTreeMap<String, StageStatus>,
    trace: Vec<StageEvent>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            evidence: AppendByProducer::new(EVIDENCE_FIELD),
            opinions: AppendByProducer::new(OPINIONS_FIELD),
            branch_outcomes: InsertIfAbsent::new(OUTCOMES_FIELD),
            stage_status: BTreeMap::new(),
            trace: Vec::new(),
        }
    }

    /// Register a node as PENDING
    pub fn register(&mut self, node: &str) -> Result<(), AuditError> {
        if self.stage_status.contains_key(node) {
            return Err(AuditError::Scheduler(format!("node '{}' registered twice", node)));
        }
        self.stage_status.insert(node.to_string(), StageStatus::Pending);
        Ok(())
    }

    pub fn status(&self, node: &str) -> Option<StageStatus> {
        self.stage_status.get(node).copied()
    }

    pub fn stage_status(&self) -> &BTreeMap<String, StageStatus> {
        &self.stage_status
    }

    pub fn transition(&mut self, node: &str, next: StageStatus) -> Result<(), AuditError> {
        let current = self
            .stage_status
            .get_mut(node)
            .ok_or_else(|| AuditError::Scheduler(format!("unknown node '{}'", node)))?;

        if !current.can_become(next) {
            return Err(AuditError::Scheduler(format!(
                "illegal transition for '{}': {} -> {}",
                node, current, next
            )));
        }

        debug!("{}: {} -> {}", node, current, next);
        *current = next;
        self.trace.push(StageEvent {
            seq: self.trace.len(),
            node: node.to_string(),
            status: next,
        });
        Ok(())
    }

    /// Land a branch update atomically.
    ///
    /// Every reducer is checked before any is applied. A `DuplicateProducer`
    /// leaves state untouched and is the caller's to recover from. A
    /// `StateConflict` is fatal.
    pub fn commit(&mut self, update: BranchUpdate) -> Result<(), AuditError> {
        let key = update.outcome_key();
        let producer_id = update.producer_id;
        let outcome = (key, update.outcome);

        match update.records {
            BranchRecords::Evidence(items) => {
                let batch = Batch { producer_id, items };
                self.evidence.check(&batch)?;
                self.branch_outcomes.check(&outcome)?;
                self.evidence.apply(batch);
            }
            BranchRecords::Opinions(items) => {
                let batch = Batch { producer_id, items };
                self.opinions.check(&batch)?;
                self.branch_outcomes.check(&outcome)?;
                self.opinions.apply(batch);
            }
        }
        self.branch_outcomes.apply(outcome);
        Ok(())
    }

    pub fn evidence(&self) -> EvidenceSet {
        EvidenceSet {
            records: self.evidence.items().clone(),
        }
    }

    pub fn opinions(&self) -> OpinionSet {
        OpinionSet {
            records: self.opinions.items().clone(),
        }
    }

    pub fn branch_outcomes(&self) -> &BTreeMap<String, BranchOutcome> {
        self.branch_outcomes.entries()
    }

    pub fn trace(&self) -> &[StageEvent] {
        &self.trace
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(self)
    }
}
