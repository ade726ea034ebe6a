//! The Chief Justice: deterministic synthesis of one verdict.
//!
//! Rules, in order:
//! 1. Security override caps the rounded score when any record carries
//!    `security_violation`.
//! 2. Fact supremacy drops every opinion with a claim the evidence
//!    contradicts.
//! 3. Weighted aggregation over the surviving opinions.
//! 4. Dissent detection over every non-gap opinion.
//!
//! When nothing survives rule 2 the score is the policy floor and the verdict
//! carries a caveat instead of an aggregate. No clock, no randomness: all
//! iteration is over ordered maps keyed by id.

pub mod dissent;
pub mod rules;

use crate::state::{EvidenceSet, OpinionSet};
use tracing::{debug, info};
use tribunal_common::{Citation, OpinionRecord, PolicyConfig, Rule, RuleApplication, Verdict};

#[derive(Debug, Clone, Default)]
pub struct ChiefJustice {
    policy: PolicyConfig,
}

impl ChiefJustice {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn deliberate(&self, evidence: &EvidenceSet, opinions: &OpinionSet) -> Verdict {
        let overruled = rules::fact_supremacy(evidence, opinions);
        let surviving: Vec<&OpinionRecord> = opinions
            .iter()
            .filter(|o| !o.gap && !overruled.contains_key(&o.judge_id))
            .collect();

        let mut caveat = None;
        let (mut score, aggregation) = match rules::weighted_mean(surviving.iter().copied(), &self.policy.weights) {
            Some(mean) => {
                let rounded = rules::round_score(mean, self.policy.precision);
                let cited = surviving.iter().map(|o| Citation::Opinion(o.judge_id.clone())).collect();
                let note = format!(
                    "weighted mean {:.4} over {} opinion(s), rounded to {}",
                    mean,
                    surviving.len(),
                    rounded
                );
                (rounded, RuleApplication::new(Rule::WeightedAggregation, cited, note))
            }
            None => {
                let gapped = opinions.iter().filter(|o| o.gap).count();
                let note = format!(
                    "no usable opinion: {} submitted, {} gapped, {} overruled",
                    opinions.len(),
                    gapped,
                    overruled.len()
                );
                caveat = Some(format!(
                    "Synthesis incomplete ({}); score set to the floor {:.1}",
                    note, self.policy.floor_score
                ));
                let cited = opinions.iter().map(|o| Citation::Opinion(o.judge_id.clone())).collect();
                (
                    self.policy.floor_score,
                    RuleApplication::new(Rule::SynthesisIncomplete, cited, note),
                )
            }
        };

        let mut rationale = Vec::new();

        let triggers = rules::security_triggers(evidence, opinions);
        if !triggers.is_empty() {
            info!("Security override triggered by {} record(s)", triggers.len());
            rationale.push(rules::security_override(triggers, score, self.policy.security_ceiling));
            score = score.min(self.policy.security_ceiling);
        }

        for application in overruled.into_values() {
            debug!("{}", application.note);
            rationale.push(application);
        }
        rationale.push(aggregation);

        let scored: Vec<&OpinionRecord> = opinions.iter().filter(|o| !o.gap).collect();
        let dissent_summary = dissent::detect(&scored, self.policy.dissent_variance_threshold);
        if let Some(dissent) = &dissent_summary {
            let cited = dissent
                .low
                .iter()
                .chain(dissent.high.iter())
                .map(|o| Citation::Opinion(o.judge_id.clone()))
                .collect();
            rationale.push(RuleApplication::new(Rule::DissentDetection, cited, dissent.summary.clone()));
        }

        Verdict {
            score,
            rationale,
            dissent_summary,
            evidence_gaps: evidence.gap_categories(),
            caveat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_common::{Flag, Persona, ReasonCode};

    fn bench() -> OpinionSet {
        OpinionSet::from_records(vec![
            OpinionRecord::new("prosecutor", Persona::Adversarial, 2.0),
            OpinionRecord::new("defense", Persona::Optimistic, 5.0),
            OpinionRecord::new("tech_lead", Persona::Pragmatic, 4.0),
        ])
    }

    #[test]
    fn test_weighted_example() {
        let verdict = ChiefJustice::default().deliberate(&EvidenceSet::default(), &bench());
        assert_eq!(verdict.score, 3.8);
        assert!(verdict.applied(Rule::WeightedAggregation).is_some());
        assert!(verdict.applied(Rule::SecurityOverride).is_none());
        assert!(verdict.caveat.is_none());
    }

    #[test]
    fn test_security_flag_on_opinion_caps() {
        // ordered by judge id: defense, prosecutor, tech_lead
        let mut opinions = bench().to_vec();
        opinions[0] = opinions[0].clone().with_flag(Flag::SecurityViolation);
        let verdict =
            ChiefJustice::default().deliberate(&EvidenceSet::default(), &OpinionSet::from_records(opinions));

        assert_eq!(verdict.score, 3.0);
        let entry = verdict.applied(Rule::SecurityOverride).unwrap();
        assert_eq!(verdict.rationale[0].rule, Rule::SecurityOverride);
        assert!(entry.cites_opinion("defense"));
        assert!(!entry.cites_opinion("prosecutor"));
    }

    #[test]
    fn test_all_gapped_is_incomplete() {
        let opinions = OpinionSet::from_records(vec![
            OpinionRecord::gap("prosecutor", Persona::Adversarial, ReasonCode::Timeout),
            OpinionRecord::gap("defense", Persona::Optimistic, ReasonCode::SchemaInvalid),
        ]);
        let verdict = ChiefJustice::default().deliberate(&EvidenceSet::default(), &opinions);

        assert_eq!(verdict.score, 1.0);
        assert!(verdict.caveat.is_some());
        assert!(verdict.applied(Rule::SynthesisIncomplete).is_some());
        assert!(verdict.applied(Rule::WeightedAggregation).is_none());
        assert!(verdict.dissent_summary.is_none());
    }

    #[test]
    fn test_no_opinions_is_incomplete() {
        let verdict = ChiefJustice::default().deliberate(&EvidenceSet::default(), &OpinionSet::default());
        assert_eq!(verdict.score, 1.0);
        assert!(verdict.caveat.as_deref().unwrap_or("").contains("0 submitted"));
    }

    #[test]
    fn test_dissent_does_not_change_score() {
        let opinions = OpinionSet::from_records(vec![
            OpinionRecord::new("prosecutor", Persona::Adversarial, 1.0),
            OpinionRecord::new("defense", Persona::Optimistic, 5.0),
            OpinionRecord::new("tech_lead", Persona::Pragmatic, 3.0),
        ]);
        let verdict = ChiefJustice::default().deliberate(&EvidenceSet::default(), &opinions);

        // (1 + 5 + 2*3) / 4
        assert_eq!(verdict.score, 3.0);
        let dissent = verdict.dissent_summary.unwrap();
        assert!(dissent.variance > 2.0);
        assert_eq!(verdict.rationale.last().unwrap().rule, Rule::DissentDetection);
    }
}
