//! Opinion producers.
//!
//! Each judge reads the merged evidence, asks the reasoner for a ruling in its
//! persona and turns the validated response into an `OpinionRecord`. A
//! reasoner gap becomes a gap opinion, never an error.

pub mod bench;
pub mod prompts;

pub use bench::{Defense, Prosecutor, TechLead};

use crate::invoker::{Invocation, ReasonerInvoker, ReasoningRequest};
use crate::state::EvidenceSet;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use tribunal_common::{AuditError, Claim, Flag, OpinionRecord, Persona, Schema};

#[async_trait]
pub trait Judge: Send + Sync {
    fn id(&self) -> &str;

    fn persona(&self) -> Persona;

    async fn judge(&self, evidence: &EvidenceSet) -> Result<OpinionRecord, AuditError>;
}

fn field<T: serde::de::DeserializeOwned + Default>(value: &Value, name: &str) -> Result<T, AuditError> {
    match value.get(name) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| AuditError::SchemaInvalid(format!("$.{}: {}", name, e))),
    }
}

/// Build an opinion from a response that passed `Schema::opinion_response`
pub fn opinion_from_value(judge_id: &str, persona: Persona, value: &Value) -> Result<OpinionRecord, AuditError> {
    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| AuditError::SchemaInvalid("$.score: missing".to_string()))?;
    let flags: Vec<Flag> = field(value, "flags")?;
    let citations: Vec<String> = field(value, "citations")?;
    let claims: Vec<Claim> = field(value, "claims")?;
    let argument: String = field(value, "argument")?;

    let mut opinion = OpinionRecord::new(judge_id, persona, score).with_argument(argument);
    opinion.flags = flags.into_iter().collect();
    opinion.citations = citations;
    for claim in claims {
        opinion = opinion.with_claim(&claim.evidence_id, &claim.capability, claim.present);
    }
    opinion.validate()?;
    Ok(opinion)
}

/// Shared deliberation used by every reasoner-backed judge
pub async fn reasoned_opinion(
    invoker: &ReasonerInvoker,
    judge_id: &str,
    persona: Persona,
    persona_prompt: &str,
    evidence: &EvidenceSet,
) -> Result<OpinionRecord, AuditError> {
    let request = ReasoningRequest::new(prompts::system_prompt(persona_prompt), prompts::evidence_brief(evidence));

    match invoker.invoke(&request, &Schema::opinion_response()).await {
        Invocation::Valid { value, attempts } => {
            let opinion = opinion_from_value(judge_id, persona, &value)?;
            info!("{} scored {:.1} after {} attempt(s)", judge_id, opinion.score, attempts);
            Ok(opinion)
        }
        Invocation::Gap { reason, attempts, last_error } => {
            warn!("{} could not rule after {} attempt(s): {}", judge_id, attempts, last_error);
            Ok(OpinionRecord::gap(judge_id, persona, reason).with_argument(last_error))
        }
    }
}

/// Seat the judges named in config, in the given order
pub fn from_config(enabled: &[String], invoker: &ReasonerInvoker) -> Result<Vec<Arc<dyn Judge>>, AuditError> {
    enabled
        .iter()
        .map(|name| -> Result<Arc<dyn Judge>, AuditError> {
            match name.trim().to_lowercase().as_str() {
                "prosecutor" => Ok(Arc::new(Prosecutor::new(invoker.clone()))),
                "defense" => Ok(Arc::new(Defense::new(invoker.clone()))),
                "tech_lead" | "techlead" => Ok(Arc::new(TechLead::new(invoker.clone()))),
                other => Err(AuditError::Config(format!("unknown judge '{}'", other))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::FakeCapability;
    use serde_json::json;
    use tribunal_common::InvokerConfig;

    #[test]
    fn test_opinion_from_value() {
        let value = json!({
            "score": 4.5,
            "argument": "Solid fan-out",
            "flags": ["technical_debt"],
            "citations": ["repo:structural:0"],
            "claims": [{ "evidence_id": "repo:structural:0", "capability": "parallel_fan_out", "present": true }]
        });
        let opinion = opinion_from_value("tech_lead", Persona::Pragmatic, &value).unwrap();

        assert_eq!(opinion.score, 4.5);
        assert!(opinion.has_flag(Flag::TechnicalDebt));
        assert_eq!(opinion.citations, vec!["repo:structural:0".to_string()]);
        assert_eq!(opinion.claims.len(), 1);
    }

    #[test]
    fn test_unknown_judge_is_config_error() {
        let invoker = ReasonerInvoker::new(
            Arc::new(FakeCapability::always_json(json!({}))),
            &InvokerConfig::default(),
        );
        let names = vec!["prosecutor".to_string(), "bailiff".to_string()];
        let err = from_config(&names, &invoker).err().unwrap();
        assert_eq!(err.exit_code(), 64);

        let seated = from_config(&["tech_lead".to_string(), "defense".to_string()], &invoker).unwrap();
        assert_eq!(seated[0].persona(), Persona::Pragmatic);
        assert_eq!(seated[1].id(), "defense");
    }
}
