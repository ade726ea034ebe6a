//! Individual synthesis rules. Each is a pure function over frozen sets.

use crate::state::{EvidenceSet, OpinionSet};
use std::collections::BTreeMap;
use tribunal_common::{Citation, Flag, JudgeId, OpinionRecord, Rule, RuleApplication, WeightTable};

/// Round half away from zero to `precision` decimals
pub fn round_score(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Every record carrying `security_violation`, evidence before opinions
pub fn security_triggers(evidence: &EvidenceSet, opinions: &OpinionSet) -> Vec<Citation> {
    let mut cited: Vec<Citation> = evidence
        .iter()
        .filter(|e| e.has_flag(Flag::SecurityViolation))
        .map(|e| Citation::Evidence(e.id.clone()))
        .chain(
            opinions
                .iter()
                .filter(|o| o.has_flag(Flag::SecurityViolation))
                .map(|o| Citation::Opinion(o.judge_id.clone())),
        )
        .collect();
    cited.sort();
    cited.dedup();
    cited
}

pub fn security_override(cited: Vec<Citation>, before: f64, ceiling: f64) -> RuleApplication {
    let note = if before > ceiling {
        format!("security violation caps score {:.1} at {:.1}", before, ceiling)
    } else {
        format!("security violation: score {:.1} already within ceiling {:.1}", before, ceiling)
    };
    RuleApplication::new(Rule::SecurityOverride, cited, note)
}

/// One application per overruled judge, citing the evidence that contradicts it.
///
/// Claims against unknown evidence, gap evidence or capabilities the evidence
/// does not record are not contradictions.
pub fn fact_supremacy(evidence: &EvidenceSet, opinions: &OpinionSet) -> BTreeMap<JudgeId, RuleApplication> {
    let mut overruled = BTreeMap::new();

    for opinion in opinions.iter().filter(|o| !o.gap) {
        let mut cited = Vec::new();
        let mut notes = Vec::new();

        for claim in &opinion.claims {
            let Some(record) = evidence.get(&claim.evidence_id).filter(|r| !r.gap) else {
                continue;
            };
            let Some(recorded) = record.capability(&claim.capability) else {
                continue;
            };
            if recorded != claim.present {
                let citation = Citation::Evidence(record.id.clone());
                if !cited.contains(&citation) {
                    cited.push(citation);
                }
                notes.push(format!(
                    "claimed {}={} but {} records {}",
                    claim.capability, claim.present, record.id, recorded
                ));
            }
        }

        if !cited.is_empty() {
            cited.sort();
            let mut application = RuleApplication::new(
                Rule::FactSupremacy,
                cited,
                format!("{} overruled: {}", opinion.judge_id, notes.join("; ")),
            );
            application.overruled = vec![opinion.judge_id.clone()];
            overruled.insert(opinion.judge_id.clone(), application);
        }
    }

    overruled
}

/// Weighted mean of the given opinions, `None` when total weight is zero
pub fn weighted_mean<'a>(
    opinions: impl IntoIterator<Item = &'a OpinionRecord>,
    weights: &WeightTable,
) -> Option<f64> {
    let (sum, total) = opinions.into_iter().fold((0.0, 0.0), |(sum, total), o| {
        let w = weights.weight(o.persona);
        (sum + w * o.score, total + w)
    });
    (total > 0.0).then(|| sum / total)
}
