//! Opinion records produced by judges.

use crate::error::{AuditError, ReasonCode};
use crate::evidence::{Flag, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub type JudgeId = String;

/// Lowest score a judge may give
pub const SCORE_MIN: f64 = 1.0;
/// Highest score a judge may give
pub const SCORE_MAX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Adversarial,
    Optimistic,
    Pragmatic,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Adversarial, Persona::Optimistic, Persona::Pragmatic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adversarial => "adversarial",
            Self::Optimistic => "optimistic",
            Self::Pragmatic => "pragmatic",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "adversarial" | "prosecutor" => Some(Self::Adversarial),
            "optimistic" | "defense" => Some(Self::Optimistic),
            "pragmatic" | "tech_lead" | "techlead" => Some(Self::Pragmatic),
            _ => None,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checkable factual assertion backing an opinion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub evidence_id: RecordId,
    pub capability: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionRecord {
    pub judge_id: JudgeId,
    pub persona: Persona,
    pub score: f64,
    #[serde(default)]
    pub flags: BTreeSet<Flag>,
    #[serde(default)]
    pub citations: Vec<RecordId>,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub argument: String,
    #[serde(default)]
    pub gap: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_reason: Option<ReasonCode>,
}

impl OpinionRecord {
    pub fn new(judge_id: impl Into<JudgeId>, persona: Persona, score: f64) -> Self {
        Self {
            judge_id: judge_id.into(),
            persona,
            score,
            flags: BTreeSet::new(),
            citations: Vec::new(),
            claims: Vec::new(),
            argument: String::new(),
            gap: false,
            gap_reason: None,
        }
    }

    /// Placeholder for a judge that could not deliberate
    pub fn gap(judge_id: impl Into<JudgeId>, persona: Persona, reason: ReasonCode) -> Self {
        Self {
            gap: true,
            gap_reason: Some(reason),
            ..Self::new(judge_id, persona, SCORE_MIN)
        }
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn with_citations(mut self, citations: &[&str]) -> Self {
        self.citations = citations.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_claim(mut self, evidence_id: &str, capability: &str, present: bool) -> Self {
        self.claims.push(Claim {
            evidence_id: evidence_id.to_string(),
            capability: capability.to_string(),
            present,
        });
        if !self.citations.iter().any(|c| c == evidence_id) {
            self.citations.push(evidence_id.to_string());
        }
        self
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = argument.into();
        self
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.judge_id.is_empty() {
            return Err(AuditError::SchemaInvalid("opinion judge_id is empty".to_string()));
        }
        if !self.score.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&self.score) {
            return Err(AuditError::SchemaInvalid(format!(
                "opinion '{}' score {} outside [{}, {}]",
                self.judge_id, self.score, SCORE_MIN, SCORE_MAX
            )));
        }
        if self.gap != self.gap_reason.is_some() {
            return Err(AuditError::SchemaInvalid(format!(
                "opinion '{}' gap flag and gap_reason disagree",
                self.judge_id
            )));
        }
        Ok(())
    }
}
