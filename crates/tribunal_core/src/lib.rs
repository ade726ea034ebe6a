//! Tribunal audit engine.
//!
//! A run fans evaluators out over a target repository, merges their evidence,
//! fans judges out over that evidence, merges their opinions and hands both
//! to the Chief Justice for one deterministic verdict.
//!
//! ```rust,ignore
//! let graph = AuditGraph::new(evaluators::standard(timeout), judges, &config);
//! let outcome = graph.run(AuditInput::local("./agent").with_document("report.md")).await?;
//! println!("{}", report::render_markdown(&outcome));
//! ```

pub mod context;
pub mod evaluators;
pub mod invoker;
pub mod judges;
pub mod justice;
pub mod report;
pub mod scheduler;
pub mod state;

pub use context::{AuditContext, AuditInput, DocumentDescriptor, TargetDescriptor};
pub use evaluators::Evaluator;
pub use invoker::{Invocation, ReasonerInvoker, ReasoningCapability, ReasoningRequest};
pub use judges::Judge;
pub use justice::ChiefJustice;
pub use scheduler::{AuditGraph, AuditOutcome, RunEvent};
pub use state::{EvidenceSet, OpinionSet, RunState, StageStatus};
