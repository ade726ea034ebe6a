//! Final verdict and its rationale trail.

use crate::evidence::{EvidenceCategory, RecordId};
use crate::opinion::{JudgeId, Persona};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Synthesis rules in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    SecurityOverride,
    FactSupremacy,
    WeightedAggregation,
    DissentDetection,
    SynthesisIncomplete,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityOverride => "security_override",
            Self::FactSupremacy => "fact_supremacy",
            Self::WeightedAggregation => "weighted_aggregation",
            Self::DissentDetection => "dissent_detection",
            Self::SynthesisIncomplete => "synthesis_incomplete",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record a rule application relied on
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Citation {
    Evidence(RecordId),
    Opinion(JudgeId),
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Citation::Evidence(id) => write!(f, "evidence:{}", id),
            Citation::Opinion(id) => write!(f, "opinion:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleApplication {
    pub rule: Rule,
    pub cited: Vec<Citation>,
    /// Judges whose input this rule discarded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overruled: Vec<JudgeId>,
    pub note: String,
}

impl RuleApplication {
    pub fn new(rule: Rule, cited: Vec<Citation>, note: impl Into<String>) -> Self {
        Self {
            rule,
            cited,
            overruled: Vec::new(),
            note: note.into(),
        }
    }

    pub fn cites_evidence(&self, id: &str) -> bool {
        self.cited
            .iter()
            .any(|c| matches!(c, Citation::Evidence(e) if e == id))
    }

    pub fn cites_opinion(&self, judge_id: &str) -> bool {
        self.cited
            .iter()
            .any(|c| matches!(c, Citation::Opinion(j) if j == judge_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub judge_id: JudgeId,
    pub persona: Persona,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissentSummary {
    pub variance: f64,
    pub spread: f64,
    pub low: Vec<Outlier>,
    pub high: Vec<Outlier>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: f64,
    pub rationale: Vec<RuleApplication>,
    pub dissent_summary: Option<DissentSummary>,
    pub evidence_gaps: BTreeSet<EvidenceCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveat: Option<String>,
}

impl Verdict {
    pub fn applied(&self, rule: Rule) -> Option<&RuleApplication> {
        self.rationale.iter().find(|r| r.rule == rule)
    }

    pub fn has_gaps(&self) -> bool {
        !self.evidence_gaps.is_empty()
    }

    /// Grade band shown in reports
    pub fn grade(&self) -> &'static str {
        if self.score >= 4.5 {
            "Master Thinker"
        } else if self.score >= 3.5 {
            "Competent Orchestrator"
        } else if self.score >= 2.5 {
            "Developing Engineer"
        } else {
            "Vibe Coding"
        }
    }
}
