//! System prompts and the evidence brief every judge receives.

use crate::state::EvidenceSet;
use serde_json::{json, Value};

const RESPONSE_CONTRACT: &str = r#"
Reply with one JSON object and nothing else:
{
  "score": <number from 1 to 5>,
  "argument": "<your reasoning>",
  "flags": [<zero or more of "security_violation", "orchestration_fraud", "hallucination_liability", "technical_debt">],
  "citations": ["<evidence id>", ...],
  "claims": [{"evidence_id": "<id>", "capability": "<name>", "present": <true|false>}, ...]
}
Every claim must name an evidence id from the brief and a capability it records.
Claims that contradict the evidence void your opinion."#;

pub const PROSECUTOR_SYSTEM: &str = "You are the prosecutor on an engineering review bench. \
Assume nothing works until the evidence proves it. Hunt for missing capabilities, unsafe tool use \
and architecture that only looks parallel. Score 1 for broken or fraudulent orchestration and 5 only \
when nothing is left to charge. Raise security_violation for raw shell execution or unsanitized input \
and orchestration_fraud for claimed concurrency the code does not have.";

pub const DEFENSE_SYSTEM: &str = "You are the defense on an engineering review bench. \
Credit intent, effort and sound ideas even where execution is rough. Point to the capabilities the \
evidence does record and to iteration visible in the history. Score 1 only when no understanding is \
shown at all and 5 when the work is both ambitious and delivered.";

pub const TECH_LEAD_SYSTEM: &str = "You are the tech lead on an engineering review bench and the tie-breaker. \
Ignore effort and rhetoric and judge the artifacts: does fan-out actually run in parallel, do \
reducers merge state safely, is the state typed, is tool use isolated. Score 3 for functional but \
ordinary work, 4 for sound architecture with little debt, 5 for production-ready. Raise technical_debt \
where maintainability suffers.";

pub fn system_prompt(persona_text: &str) -> String {
    format!("{}\n{}", persona_text, RESPONSE_CONTRACT)
}

fn brief_entry(record: &tribunal_common::EvidenceRecord) -> Value {
    if record.gap {
        return json!({
            "id": record.id,
            "category": record.category,
            "gap": true,
            "reason": record.gap_reason,
        });
    }
    json!({
        "id": record.id,
        "category": record.category,
        "confidence": record.confidence,
        "flags": record.flags,
        "capabilities": record.payload.get("capabilities").cloned().unwrap_or(Value::Null),
        "findings": record.payload.get("findings").cloned().unwrap_or(Value::Null),
    })
}

/// Evidence summary in id order
pub fn evidence_brief(evidence: &EvidenceSet) -> String {
    let entries: Vec<Value> = evidence.iter().map(brief_entry).collect();
    let body = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Evidence collected by the investigators ({} record(s)). Gap records mark evidence that could not be gathered.\n{}\n\nRender your opinion.",
        evidence.len(),
        body
    )
}
