//! The three seated judges.

use super::{prompts, reasoned_opinion, Judge};
use crate::invoker::ReasonerInvoker;
use crate::state::EvidenceSet;
use async_trait::async_trait;
use tribunal_common::{AuditError, Flag, OpinionRecord, Persona};

/// Adversarial judge
pub struct Prosecutor {
    invoker: ReasonerInvoker,
}

impl Prosecutor {
    pub fn new(invoker: ReasonerInvoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Judge for Prosecutor {
    fn id(&self) -> &str {
        "prosecutor"
    }

    fn persona(&self) -> Persona {
        Persona::Adversarial
    }

    async fn judge(&self, evidence: &EvidenceSet) -> Result<OpinionRecord, AuditError> {
        let mut opinion =
            reasoned_opinion(&self.invoker, self.id(), self.persona(), prompts::PROSECUTOR_SYSTEM, evidence).await?;

        // flagged evidence is always charged
        if !opinion.gap && evidence.iter().any(|e| e.has_flag(Flag::SecurityViolation)) {
            opinion.flags.insert(Flag::SecurityViolation);
        }
        Ok(opinion)
    }
}

/// Optimistic judge
pub struct Defense {
    invoker: ReasonerInvoker,
}

impl Defense {
    pub fn new(invoker: ReasonerInvoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Judge for Defense {
    fn id(&self) -> &str {
        "defense"
    }

    fn persona(&self) -> Persona {
        Persona::Optimistic
    }

    async fn judge(&self, evidence: &EvidenceSet) -> Result<OpinionRecord, AuditError> {
        reasoned_opinion(&self.invoker, self.id(), self.persona(), prompts::DEFENSE_SYSTEM, evidence).await
    }
}

/// Pragmatic judge and tie-breaker
pub struct TechLead {
    invoker: ReasonerInvoker,
}

impl TechLead {
    pub fn new(invoker: ReasonerInvoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Judge for TechLead {
    fn id(&self) -> &str {
        "tech_lead"
    }

    fn persona(&self) -> Persona {
        Persona::Pragmatic
    }

    async fn judge(&self, evidence: &EvidenceSet) -> Result<OpinionRecord, AuditError> {
        reasoned_opinion(&self.invoker, self.id(), self.persona(), prompts::TECH_LEAD_SYSTEM, evidence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{FakeCapability, FakeCapabilityBuilder};
    use serde_json::json;
    use std::sync::Arc;
    use tribunal_common::{EvidenceCategory, EvidenceRecord, InvokerConfig, ReasonCode};

    fn invoker(fake: &FakeCapability) -> ReasonerInvoker {
        ReasonerInvoker::new(Arc::new(fake.clone()), &InvokerConfig::default())
    }

    #[tokio::test]
    async fn test_prosecutor_carries_security_charge() {
        let fake = FakeCapability::always_json(json!({ "score": 2, "argument": "weak" }));
        let evidence = EvidenceSet::from_records(vec![EvidenceRecord::new(
            "repo:structural:0",
            "repo",
            EvidenceCategory::Structural,
            json!({ "capabilities": {}, "files_scanned": 1 }),
            0.9,
        )
        .with_flag(Flag::SecurityViolation)]);

        let opinion = Prosecutor::new(invoker(&fake)).judge(&evidence).await.unwrap();
        assert!(opinion.has_flag(Flag::SecurityViolation));
        assert_eq!(opinion.persona, Persona::Adversarial);
    }

    #[tokio::test]
    async fn test_malformed_reasoner_yields_gap_opinion() {
        let fake = FakeCapabilityBuilder::new()
            .fallback(crate::invoker::FakeReply::Text("I think it deserves a four".into()))
            .build();

        let opinion = Defense::new(invoker(&fake)).judge(&EvidenceSet::default()).await.unwrap();
        assert!(opinion.gap);
        assert_eq!(opinion.gap_reason, Some(ReasonCode::SchemaInvalid));
        assert_eq!(fake.call_count(), 3);
    }
}
