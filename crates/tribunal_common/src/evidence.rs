//! Evidence records produced by evaluators.

use crate::error::{AuditError, ReasonCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

pub type RecordId = String;
pub type ProducerId = String;

/// Kind of evidence an evaluator produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    Structural,
    Historical,
    Textual,
    General,
}

impl EvidenceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Historical => "historical",
            Self::Textual => "textual",
            Self::General => "general",
        }
    }
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags raised on evidence or opinions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    SecurityViolation,
    OrchestrationFraud,
    HallucinationLiability,
    TechnicalDebt,
}

impl Flag {
    pub const ALL: [Flag; 4] = [
        Flag::SecurityViolation,
        Flag::OrchestrationFraud,
        Flag::HallucinationLiability,
        Flag::TechnicalDebt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityViolation => "security_violation",
            Self::OrchestrationFraud => "orchestration_fraud",
            Self::HallucinationLiability => "hallucination_liability",
            Self::TechnicalDebt => "technical_debt",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.as_str()).collect()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of objective evidence. Never mutated after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: RecordId,
    pub producer_id: ProducerId,
    pub category: EvidenceCategory,
    pub payload: Value,
    pub confidence: f64,
    #[serde(default)]
    pub flags: BTreeSet<Flag>,
    #[serde(default)]
    pub gap: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_reason: Option<ReasonCode>,
}

impl EvidenceRecord {
    pub fn new(
        id: impl Into<RecordId>,
        producer_id: impl Into<ProducerId>,
        category: EvidenceCategory,
        payload: Value,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            producer_id: producer_id.into(),
            category,
            payload,
            confidence,
            flags: BTreeSet::new(),
            gap: false,
            gap_reason: None,
        }
    }

    /// Placeholder for an evaluator that could not complete
    pub fn gap(
        producer_id: impl Into<ProducerId>,
        category: EvidenceCategory,
        reason: ReasonCode,
        detail: impl Into<String>,
    ) -> Self {
        let producer_id = producer_id.into();
        Self {
            id: format!("{}:{}:gap", producer_id, category),
            producer_id,
            category,
            payload: serde_json::json!({ "detail": detail.into() }),
            confidence: 0.0,
            flags: BTreeSet::new(),
            gap: true,
            gap_reason: Some(reason),
        }
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Recorded presence of a named capability, if the payload records it
    pub fn capability(&self, name: &str) -> Option<bool> {
        self.payload
            .get("capabilities")
            .and_then(|caps| caps.get(name))
            .and_then(Value::as_bool)
    }

    /// Structural checks that hold for every category
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.id.is_empty() {
            return Err(AuditError::SchemaInvalid("evidence id is empty".to_string()));
        }
        if self.producer_id.is_empty() {
            return Err(AuditError::SchemaInvalid(format!(
                "evidence '{}' has empty producer_id",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(AuditError::SchemaInvalid(format!(
                "evidence '{}' confidence {} outside [0, 1]",
                self.id, self.confidence
            )));
        }
        if self.gap != self.gap_reason.is_some() {
            return Err(AuditError::SchemaInvalid(format!(
                "evidence '{}' gap flag and gap_reason disagree",
                self.id
            )));
        }
        if !self.payload.is_object() {
            return Err(AuditError::SchemaInvalid(format!(
                "evidence '{}' payload is not an object",
                self.id
            )));
        }
        Ok(())
    }
}
