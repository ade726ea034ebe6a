//! Serializable views of run state for streaming and traces.

use super::{BranchOutcome, RunState, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tribunal_common::{EvidenceRecord, OpinionRecord};

/// One node status change, in the order the scheduler made it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    pub seq: usize,
    pub node: String,
    pub status: StageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub stage_status: BTreeMap<String, StageStatus>,
    pub branch_outcomes: BTreeMap<String, BranchOutcome>,
    pub evidence: Vec<EvidenceRecord>,
    pub opinions: Vec<OpinionRecord>,
}

impl StateSnapshot {
    pub fn capture(state: &RunState) -> Self {
        Self {
            stage_status: state.stage_status().clone(),
            branch_outcomes: state.branch_outcomes().clone(),
            evidence: state.evidence().to_vec(),
            opinions: state.opinions().to_vec(),
        }
    }

    pub fn gap_count(&self) -> usize {
        self.evidence.iter().filter(|e| e.gap).count() + self.opinions.iter().filter(|o| o.gap).count()
    }
}
