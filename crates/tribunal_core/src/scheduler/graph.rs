//! Static topology of an audit run.
//!
//! `context -> evaluator.* -> evidence_merge -> judge.* -> opinion_merge -> synthesis`

use crate::evaluators::Evaluator;
use crate::judges::Judge;
use crate::state::RunState;
use std::sync::Arc;
use tribunal_common::AuditError;

pub const CONTEXT: &str = "context";
pub const EVIDENCE_MERGE: &str = "evidence_merge";
pub const OPINION_MERGE: &str = "opinion_merge";
pub const SYNTHESIS: &str = "synthesis";

pub fn evaluator_node(index: usize, id: &str) -> String {
    format!("evaluator.{}.{}", index, id)
}

pub fn judge_node(index: usize, id: &str) -> String {
    format!("judge.{}.{}", index, id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphLayout {
    pub evaluator_nodes: Vec<String>,
    pub judge_nodes: Vec<String>,
}

impl GraphLayout {
    pub fn new(evaluators: &[Arc<dyn Evaluator>], judges: &[Arc<dyn Judge>]) -> Self {
        Self {
            evaluator_nodes: evaluators
                .iter()
                .enumerate()
                .map(|(i, e)| evaluator_node(i, e.id()))
                .collect(),
            judge_nodes: judges.iter().enumerate().map(|(i, j)| judge_node(i, j.id())).collect(),
        }
    }

    /// Every node in execution order
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes = vec![CONTEXT.to_string()];
        nodes.extend(self.evaluator_nodes.iter().cloned());
        nodes.push(EVIDENCE_MERGE.to_string());
        nodes.extend(self.judge_nodes.iter().cloned());
        nodes.push(OPINION_MERGE.to_string());
        nodes.push(SYNTHESIS.to_string());
        nodes
    }

    /// Register every node as PENDING
    pub fn register(&self, state: &mut RunState) -> Result<(), AuditError> {
        for node in self.nodes() {
            state.register(&node)?;
        }
        Ok(())
    }
}
