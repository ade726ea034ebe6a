//! Scripted evaluators and judges shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tribunal_common::{AuditError, AuditorConfig, EvidenceCategory, EvidenceRecord, Flag, OpinionRecord, Persona};
use tribunal_core::{AuditContext, AuditGraph, Evaluator, EvidenceSet, Judge};

// ============================================================================
// Payloads
// ============================================================================

pub fn payload(category: EvidenceCategory, capabilities: Value) -> Value {
    match category {
        EvidenceCategory::Structural => json!({ "capabilities": capabilities, "files_scanned": 3 }),
        EvidenceCategory::Historical => json!({ "capabilities": capabilities, "commit_count": 12 }),
        EvidenceCategory::Textual => json!({ "capabilities": capabilities, "terms": {} }),
        EvidenceCategory::General => json!({ "capabilities": capabilities }),
    }
}

pub fn record(producer: &str, category: EvidenceCategory, capabilities: Value) -> EvidenceRecord {
    EvidenceRecord::new(
        format!("{}:{}:0", producer, category),
        producer,
        category,
        payload(category, capabilities),
        0.9,
    )
}

// ============================================================================
// Scripted Evaluator
// ============================================================================

#[derive(Clone)]
pub enum Behavior {
    Records(Vec<EvidenceRecord>),
    Fail(AuditError),
    Panic,
}

#[derive(Clone)]
pub struct ScriptedEvaluator {
    id: String,
    category: EvidenceCategory,
    behavior: Behavior,
    delay: Duration,
}

impl ScriptedEvaluator {
    pub fn new(id: &str, category: EvidenceCategory, capabilities: Value) -> Self {
        Self {
            id: id.to_string(),
            category,
            behavior: Behavior::Records(vec![record(id, category, capabilities)]),
            delay: Duration::ZERO,
        }
    }

    pub fn with_records(id: &str, category: EvidenceCategory, records: Vec<EvidenceRecord>) -> Self {
        Self {
            id: id.to_string(),
            category,
            behavior: Behavior::Records(records),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(id: &str, category: EvidenceCategory, error: AuditError) -> Self {
        Self {
            id: id.to_string(),
            category,
            behavior: Behavior::Fail(error),
            delay: Duration::ZERO,
        }
    }

    pub fn panicking(id: &str, category: EvidenceCategory) -> Self {
        Self {
            id: id.to_string(),
            category,
            behavior: Behavior::Panic,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn flagged(mut self, flag: Flag) -> Self {
        if let Behavior::Records(records) = &mut self.behavior {
            for r in records.iter_mut() {
                r.flags.insert(flag);
            }
        }
        self
    }

    pub fn arc(self) -> Arc<dyn Evaluator> {
        Arc::new(self)
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> EvidenceCategory {
        self.category
    }

    async fn evaluate(&self, _ctx: &AuditContext) -> Result<Vec<EvidenceRecord>, AuditError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Records(records) => Ok(records.clone()),
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Panic => panic!("evaluator {} exploded", self.id),
        }
    }
}

// ============================================================================
// Scripted Judge
// ============================================================================

#[derive(Clone)]
pub struct ScriptedJudge {
    opinion: OpinionRecord,
    delay: Duration,
}

impl ScriptedJudge {
    pub fn new(id: &str, persona: Persona, score: f64) -> Self {
        Self {
            opinion: OpinionRecord::new(id, persona, score).with_argument("scripted"),
            delay: Duration::ZERO,
        }
    }

    pub fn from_opinion(opinion: OpinionRecord) -> Self {
        Self {
            opinion,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn arc(self) -> Arc<dyn Judge> {
        Arc::new(self)
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    fn id(&self) -> &str {
        &self.opinion.judge_id
    }

    fn persona(&self) -> Persona {
        self.opinion.persona
    }

    async fn judge(&self, _evidence: &EvidenceSet) -> Result<OpinionRecord, AuditError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.opinion.clone())
    }
}

// ============================================================================
// Standard Bench
// ============================================================================

pub fn standard_evaluators() -> Vec<Arc<dyn Evaluator>> {
    vec![
        ScriptedEvaluator::new(
            "repo",
            EvidenceCategory::Structural,
            json!({ "parallel_fan_out": true, "fan_in_barrier": true, "state_reducers": true }),
        )
        .arc(),
        ScriptedEvaluator::new("history", EvidenceCategory::Historical, json!({ "iterative_history": true })).arc(),
        ScriptedEvaluator::new("docs", EvidenceCategory::Textual, json!({ "metacognition": true })).arc(),
    ]
}

/// Scores 2 / 5 / 4 from adversarial / optimistic / pragmatic
pub fn worked_example_judges() -> Vec<Arc<dyn Judge>> {
    vec![
        ScriptedJudge::new("prosecutor", Persona::Adversarial, 2.0).arc(),
        ScriptedJudge::new("defense", Persona::Optimistic, 5.0).arc(),
        ScriptedJudge::new("tech_lead", Persona::Pragmatic, 4.0).arc(),
    ]
}

pub fn graph(evaluators: Vec<Arc<dyn Evaluator>>, judges: Vec<Arc<dyn Judge>>) -> AuditGraph {
    AuditGraph::new(evaluators, judges, &AuditorConfig::default())
        .with_branch_timeouts(Duration::from_secs(5), Duration::from_secs(5))
}

pub fn input(dir: &tempfile::TempDir) -> tribunal_core::AuditInput {
    tribunal_core::AuditInput::local(dir.path())
}
