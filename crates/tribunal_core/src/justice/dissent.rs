//! Disagreement between judges. Reported, never scored.

use tribunal_common::{DissentSummary, OpinionRecord, Outlier};

/// Population variance of the scores, `None` for an empty slice
pub fn variance(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    Some(scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n)
}

fn outliers(opinions: &[&OpinionRecord], score: f64) -> Vec<Outlier> {
    opinions
        .iter()
        .filter(|o| o.score == score)
        .map(|o| Outlier {
            judge_id: o.judge_id.clone(),
            persona: o.persona,
            score: o.score,
        })
        .collect()
}

fn describe(outliers: &[Outlier]) -> String {
    outliers
        .iter()
        .map(|o| format!("{} ({}) {:.1}", o.judge_id, o.persona, o.score))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Summary when variance strictly exceeds `threshold`. Gap opinions must be filtered out by the caller.
pub fn detect(opinions: &[&OpinionRecord], threshold: f64) -> Option<DissentSummary> {
    let scores: Vec<f64> = opinions.iter().map(|o| o.score).collect();
    let variance = variance(&scores)?;
    if variance <= threshold {
        return None;
    }

    let low_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let high_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = outliers(opinions, low_score);
    let high = outliers(opinions, high_score);

    let summary = format!(
        "Judges disagree (variance {:.2}, spread {:.1}): lowest {}; highest {}",
        variance,
        high_score - low_score,
        describe(&low),
        describe(&high)
    );

    Some(DissentSummary {
        variance,
        spread: high_score - low_score,
        low,
        high,
        summary,
    })
}
