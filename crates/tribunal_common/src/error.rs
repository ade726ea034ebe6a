//! Error taxonomy for audit runs.
//!
//! Everything below the scheduler is recovered locally and turned into a gap
//! record. Only `StateConflict` and `Scheduler` abort a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a producer degraded to a gap record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Timeout,
    Transport,
    Authentication,
    SchemaInvalid,
    MissingInput,
    Panicked,
    DuplicateProducer,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Authentication => "authentication",
            Self::SchemaInvalid => "schema_invalid",
            Self::MissingInput => "missing_input",
            Self::Panicked => "panicked",
            Self::DuplicateProducer => "duplicate_producer",
        }
    }

    /// Whether another attempt may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport | Self::SchemaInvalid)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("Schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("Tool failure ({reason}): {detail}")]
    ToolFailure { reason: ReasonCode, detail: String },

    #[error("Duplicate producer '{producer_id}' in field '{field}'")]
    DuplicateProducer { field: String, producer_id: String },

    #[error("State conflict in field '{field}' at key '{key}'")]
    StateConflict { field: String, key: String },

    #[error("Synthesis incomplete: no usable opinions")]
    SynthesisIncomplete,

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AuditError {
    pub fn tool(reason: ReasonCode, detail: impl Into<String>) -> Self {
        AuditError::ToolFailure {
            reason,
            detail: detail.into(),
        }
    }

    /// Fatal errors stop the run and no verdict is produced
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuditError::StateConflict { .. } | AuditError::Scheduler(_))
    }

    /// Reason code recorded on the gap this error degrades into
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            AuditError::SchemaInvalid(_) => ReasonCode::SchemaInvalid,
            AuditError::ToolFailure { reason, .. } => *reason,
            AuditError::DuplicateProducer { .. } => ReasonCode::DuplicateProducer,
            AuditError::Config(_) => ReasonCode::MissingInput,
            AuditError::StateConflict { .. }
            | AuditError::SynthesisIncomplete
            | AuditError::Scheduler(_) => ReasonCode::SchemaInvalid,
        }
    }

    /// Process exit code for errors that reach the binary boundary
    pub fn exit_code(&self) -> i32 {
        match self {
            AuditError::Config(_) => 64,
            _ => 1,
        }
    }
}
