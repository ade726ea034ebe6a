//! Markdown rendering of an audit outcome.

use crate::scheduler::AuditOutcome;
use serde_json::Value;
use std::fmt::Write;
use tribunal_common::{Citation, EvidenceRecord, Flag};

/// Fix instructions per capability an evaluator can report missing
pub const REMEDIATION: &[(&str, &[&str])] = &[
    (
        "parallel_fan_out",
        &[
            "Dispatch the detectives as parallel branches from a single predecessor",
            "Run the judges in parallel (Prosecutor || Defense || TechLead)",
        ],
    ),
    (
        "fan_in_barrier",
        &[
            "Add an evidence aggregator node as the fan-in before the judges",
            "Add conditional edges for error handling",
        ],
    ),
    (
        "state_reducers",
        &["Declare reducers (append, merge) on every state field written by parallel branches"],
    ),
    (
        "typed_state",
        &[
            "Use typed models for evidence and judicial opinions",
            "Ensure typed state prevents data overwriting in parallel execution",
        ],
    ),
    (
        "iterative_history",
        &[
            "Ensure commit history shows iterative development (not just an 'init' commit)",
            "Break implementation into logical commits: Setup -> Tools -> Graph",
            "Include meaningful commit messages describing changes",
        ],
    ),
    (
        "dialectical_synthesis_explained",
        &["Explain 'Dialectical Synthesis' with architectural details"],
    ),
    ("fan_in_out_explained", &["Describe how Fan-In/Fan-Out is implemented in code"]),
    (
        "metacognition_explained",
        &["Connect 'Metacognition' to the system evaluating its own quality"],
    ),
    (
        "state_synchronization_explained",
        &["Describe how parallel branches keep shared state consistent"],
    ),
];

const FALLBACK: &[&str] = &["Review the rubric and ensure all requirements are addressed"];

pub fn recommendations(capability: &str) -> &'static [&'static str] {
    REMEDIATION
        .iter()
        .find(|(name, _)| *name == capability)
        .map(|(_, steps)| *steps)
        .unwrap_or(FALLBACK)
}

/// `(capability, evidence id)` pairs from completed records, split into
/// present and missing
fn capability_findings(evidence: &[EvidenceRecord]) -> (Vec<(&str, &str)>, Vec<(&str, &str)>) {
    let mut strong = Vec::new();
    let mut weak = Vec::new();
    for record in evidence.iter().filter(|r| !r.gap) {
        let Some(capabilities) = record.payload.get("capabilities").and_then(Value::as_object) else {
            continue;
        };
        for (name, value) in capabilities {
            match value.as_bool() {
                Some(true) => strong.push((name.as_str(), record.id.as_str())),
                // an unmentioned term is covered by its `_explained` entry
                Some(false) if record.capability(&format!("{}_explained", name)) == Some(false) => {}
                Some(false) => weak.push((name.as_str(), record.id.as_str())),
                None => {}
            }
        }
    }
    (strong, weak)
}

fn render_remediation(md: &mut String, evidence: &[EvidenceRecord]) {
    let (strong, weak) = capability_findings(evidence);
    if strong.is_empty() && weak.is_empty() {
        return;
    }

    let names = |found: &[(&str, &str)]| {
        if found.is_empty() {
            "-".to_string()
        } else {
            found.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
        }
    };

    let _ = writeln!(md, "## Remediation
");
    let _ = writeln!(md, "- Strong areas: {}", names(&strong));
    let _ = writeln!(md, "- Needs improvement: {}
", names(&weak));
    if weak.is_empty() {
        let _ = writeln!(md, "All checked capabilities are present. No remediation needed.
");
        return;
    }
    for (name, id) in &weak {
        let _ = writeln!(md, "### {} ({})
", name, id);
        for step in recommendations(name) {
            let _ = writeln!(md, "- {}", step);
        }
        md.push('\n');
    }
}

fn flags<'a>(flags: impl IntoIterator<Item = &'a Flag>) -> String {
    let names: Vec<&str> = flags.into_iter().map(|f| f.as_str()).collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

fn cells(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn render_markdown(outcome: &AuditOutcome) -> String {
    let verdict = &outcome.verdict;
    let mut md = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(md, "# Audit Report: {}\n", outcome.target);
    let _ = writeln!(md, "- Run: `{}`", outcome.run_id);
    let _ = writeln!(md, "- Started: {}", outcome.started_at.to_rfc3339());
    let _ = writeln!(md, "- Finished: {}\n", outcome.finished_at.to_rfc3339());

    let _ = writeln!(md, "## Verdict\n");
    let _ = writeln!(md, "**{:.1} / 5** ({})\n", verdict.score, verdict.grade());
    if let Some(caveat) = &verdict.caveat {
        let _ = writeln!(md, "> {}\n", caveat);
    }

    let _ = writeln!(md, "## Rationale\n");
    let _ = writeln!(md, "| Rule | Cited | Overruled | Note |");
    let _ = writeln!(md, "|------|-------|-----------|------|");
    for application in &verdict.rationale {
        let cited: Vec<String> = application.cited.iter().map(Citation::to_string).collect();
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} |",
            application.rule,
            cells(&cited.join(", ")),
            cells(&application.overruled.join(", ")),
            cells(&application.note)
        );
    }
    md.push('\n');

    if let Some(dissent) = &verdict.dissent_summary {
        let _ = writeln!(md, "## Dissent\n");
        let _ = writeln!(md, "{}\n", dissent.summary);
    }

    if verdict.has_gaps() {
        let _ = writeln!(md, "## Evidence Gaps\n");
        for category in &verdict.evidence_gaps {
            let _ = writeln!(md, "- {}", category);
        }
        md.push('\n');
    }

    render_remediation(&mut md, &outcome.evidence);

    let _ = writeln!(md, "## Evidence\n");
    let _ = writeln!(md, "| Id | Category | Confidence | Flags | Status |");
    let _ = writeln!(md, "|----|----------|------------|-------|--------|");
    for record in &outcome.evidence {
        let status = match record.gap_reason {
            Some(reason) if record.gap => format!("gap ({})", reason),
            _ => "ok".to_string(),
        };
        let _ = writeln!(
            md,
            "| {} | {} | {:.2} | {} | {} |",
            record.id,
            record.category,
            record.confidence,
            flags(&record.flags),
            status
        );
    }
    md.push('\n');

    let _ = writeln!(md, "## Opinions\n");
    for opinion in &outcome.opinions {
        if opinion.gap {
            let reason = opinion.gap_reason.map(|r| r.as_str()).unwrap_or("unknown");
            let _ = writeln!(md, "### {} ({}): no opinion ({})\n", opinion.judge_id, opinion.persona, reason);
            continue;
        }
        let _ = writeln!(md, "### {} ({}): {:.1}\n", opinion.judge_id, opinion.persona, opinion.score);
        let _ = writeln!(md, "Flags: {}\n", flags(&opinion.flags));
        if !opinion.argument.is_empty() {
            let _ = writeln!(md, "{}\n", opinion.argument);
        }
    }

    md
}
