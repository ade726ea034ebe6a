//! Evidence producers.
//!
//! An evaluator reads the shared `AuditContext` and returns records for one
//! category. It never sees other evaluators' output and never touches run
//! state; whatever goes wrong becomes a gap record in the scheduler.

pub mod document;
pub mod history;
pub mod repo;

pub use document::DocAnalyst;
pub use history::HistoryInvestigator;
pub use repo::RepoInvestigator;

use crate::context::AuditContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tribunal_common::{AuditError, EvidenceCategory, EvidenceRecord};

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Producer id stamped on every record
    fn id(&self) -> &str;

    fn category(&self) -> EvidenceCategory;

    async fn evaluate(&self, ctx: &AuditContext) -> Result<Vec<EvidenceRecord>, AuditError>;
}

/// Record id `{producer}:{category}:{seq}`
pub fn record_id(producer: &str, category: EvidenceCategory, seq: usize) -> String {
    format!("{}:{}:{}", producer, category, seq)
}

/// Repository, history and document evaluators
pub fn standard(git_timeout: Duration) -> Vec<Arc<dyn Evaluator>> {
    vec![
        Arc::new(RepoInvestigator::new()),
        Arc::new(HistoryInvestigator::new(git_timeout)),
        Arc::new(DocAnalyst::new()),
    ]
}
