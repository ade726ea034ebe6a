//! Shared types for Tribunal components.
//!
//! Records, verdicts, schemas, the error taxonomy and configuration. The
//! engine in `tribunal_core` and both binaries build on these.

pub mod config;
pub mod error;
pub mod evidence;
pub mod opinion;
pub mod schema;
pub mod verdict;

pub use config::{
    AuditorConfig, InvokerConfig, JudgesConfig, PolicyConfig, ReasonerConfig, SchedulerConfig,
    WeightTable,
};
pub use error::{AuditError, ReasonCode};
pub use evidence::{EvidenceCategory, EvidenceRecord, Flag, ProducerId, RecordId};
pub use opinion::{Claim, JudgeId, OpinionRecord, Persona, SCORE_MAX, SCORE_MIN};
pub use schema::{FieldKind, Schema, SchemaViolations, Violation};
pub use verdict::{Citation, DissentSummary, Outlier, Rule, RuleApplication, Verdict};
