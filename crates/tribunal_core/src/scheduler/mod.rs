//! Graph scheduler.
//!
//! Runs the fixed audit graph: evaluators fan out over the context and fan
//! in at `evidence_merge`, judges fan out over the merged evidence and fan in
//! at `opinion_merge`, then the Chief Justice rules once. Branches never
//! touch run state; their updates are committed here as they join, one at a
//! time. Only a `StateConflict` or a scheduler defect aborts a run.

pub mod branch;
pub mod graph;

pub use graph::{GraphLayout, CONTEXT, EVIDENCE_MERGE, OPINION_MERGE, SYNTHESIS};

use crate::context::{AuditContext, AuditInput};
use crate::evaluators::Evaluator;
use crate::judges::Judge;
use crate::justice::ChiefJustice;
use crate::state::{BranchOutcome, BranchUpdate, RunState, StageEvent, StageStatus, StateSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use tribunal_common::{AuditError, AuditorConfig, EvidenceRecord, OpinionRecord, Verdict};
use uuid::Uuid;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub run_id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Ordered by record id
    pub evidence: Vec<EvidenceRecord>,
    /// Ordered by judge id
    pub opinions: Vec<OpinionRecord>,
    pub verdict: Verdict,
    pub stage_status: BTreeMap<String, StageStatus>,
    pub branch_outcomes: BTreeMap<String, BranchOutcome>,
    pub trace: Vec<StageEvent>,
}

impl AuditOutcome {
    /// 0 for a clean verdict, 2 when evidence categories are missing
    pub fn exit_code(&self) -> i32 {
        if self.verdict.has_gaps() {
            2
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A node reached COMPLETED or FAILED
    StageCompleted {
        node: String,
        status: StageStatus,
        snapshot: StateSnapshot,
    },
    Finished(Box<AuditOutcome>),
    Aborted(AuditError),
}

type Events<'a> = Option<&'a mpsc::Sender<RunEvent>>;

async fn emit(events: Events<'_>, state: &RunState, node: &str) {
    let Some(tx) = events else {
        return;
    };
    let status = state.status(node).unwrap_or(StageStatus::Pending);
    let event = RunEvent::StageCompleted {
        node: node.to_string(),
        status,
        snapshot: state.snapshot(),
    };
    // a dropped receiver only stops the stream, never the run
    let _ = tx.send(event).await;
}

#[derive(Clone)]
pub struct AuditGraph {
    evaluators: Vec<Arc<dyn Evaluator>>,
    judges: Vec<Arc<dyn Judge>>,
    justice: ChiefJustice,
    evaluator_timeout: Duration,
    judge_timeout: Duration,
}

impl AuditGraph {
    pub fn new(evaluators: Vec<Arc<dyn Evaluator>>, judges: Vec<Arc<dyn Judge>>, config: &AuditorConfig) -> Self {
        Self {
            evaluators,
            judges,
            justice: ChiefJustice::new(config.policy.clone()),
            evaluator_timeout: config.scheduler.evaluator_timeout(),
            judge_timeout: config.scheduler.judge_timeout(),
        }
    }

    /// Override per-branch limits (sub-second limits for tests)
    pub fn with_branch_timeouts(mut self, evaluator: Duration, judge: Duration) -> Self {
        self.evaluator_timeout = evaluator;
        self.judge_timeout = judge;
        self
    }

    pub fn layout(&self) -> GraphLayout {
        GraphLayout::new(&self.evaluators, &self.judges)
    }

    pub async fn run(&self, input: AuditInput) -> Result<AuditOutcome, AuditError> {
        self.execute(input, None).await
    }

    /// One event per finished node, then `Finished` or `Aborted`.
    /// Must be called inside a tokio runtime.
    pub fn stream(&self, input: AuditInput) -> ReceiverStream<RunEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let graph = self.clone();
        tokio::spawn(async move {
            let last = match graph.execute(input, Some(&tx)).await {
                Ok(outcome) => RunEvent::Finished(Box::new(outcome)),
                Err(e) => RunEvent::Aborted(e),
            };
            let _ = tx.send(last).await;
        });
        ReceiverStream::new(rx)
    }

    async fn execute(&self, input: AuditInput, events: Events<'_>) -> Result<AuditOutcome, AuditError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let target = input.target.label();
        info!("Audit {} of {} started", run_id, target);

        let layout = self.layout();
        let mut state = RunState::new();
        layout.register(&mut state)?;

        let result = self.drive(&run_id, input, &layout, &mut state, events).await;
        let verdict = match result {
            Ok(verdict) => verdict,
            Err(e) => {
                error!("Audit {} aborted: {}", run_id, e);
                return Err(e);
            }
        };

        info!(
            "Audit {} finished: score {:.1} ({}), gaps {:?}",
            run_id,
            verdict.score,
            verdict.grade(),
            verdict.evidence_gaps
        );

        Ok(AuditOutcome {
            run_id,
            target,
            started_at,
            finished_at: Utc::now(),
            evidence: state.evidence().to_vec(),
            opinions: state.opinions().to_vec(),
            verdict,
            stage_status: state.stage_status().clone(),
            branch_outcomes: state.branch_outcomes().clone(),
            trace: state.trace().to_vec(),
        })
    }

    async fn drive(
        &self,
        run_id: &str,
        input: AuditInput,
        layout: &GraphLayout,
        state: &mut RunState,
        events: Events<'_>,
    ) -> Result<Verdict, AuditError> {
        state.transition(CONTEXT, StageStatus::Running)?;
        let ctx = Arc::new(AuditContext::prepare(run_id, input, self.evaluator_timeout).await);
        state.transition(CONTEXT, StageStatus::Completed)?;
        emit(events, state, CONTEXT).await;

        let mut branches = JoinSet::new();
        for (node, evaluator) in layout.evaluator_nodes.iter().zip(&self.evaluators) {
            state.transition(node, StageStatus::Running)?;
            branches.spawn(branch::run_evaluator(
                node.clone(),
                evaluator.clone(),
                ctx.clone(),
                self.evaluator_timeout,
            ));
        }
        self.fan_in(state, &mut branches, EVIDENCE_MERGE, events).await?;

        let evidence = state.evidence();
        info!("Evidence merged: {} record(s)", evidence.len());

        for (node, judge) in layout.judge_nodes.iter().zip(&self.judges) {
            state.transition(node, StageStatus::Running)?;
            branches.spawn(branch::run_judge(
                node.clone(),
                judge.clone(),
                evidence.clone(),
                self.judge_timeout,
            ));
        }
        self.fan_in(state, &mut branches, OPINION_MERGE, events).await?;

        state.transition(SYNTHESIS, StageStatus::Running)?;
        let verdict = self.justice.deliberate(&state.evidence(), &state.opinions());
        state.transition(SYNTHESIS, StageStatus::Completed)?;
        emit(events, state, SYNTHESIS).await;
        Ok(verdict)
    }

    /// Commit each branch as it joins, then close the barrier.
    async fn fan_in(
        &self,
        state: &mut RunState,
        branches: &mut JoinSet<BranchUpdate>,
        merge: &str,
        events: Events<'_>,
    ) -> Result<(), AuditError> {
        if branches.is_empty() {
            state.transition(merge, StageStatus::Running)?;
        }

        while let Some(joined) = branches.join_next().await {
            let update = joined.map_err(|e| AuditError::Scheduler(format!("branch wrapper failed: {}", e)))?;
            if state.status(merge) == Some(StageStatus::Pending) {
                state.transition(merge, StageStatus::Running)?;
            }

            let node = update.outcome.node.clone();
            let status = update.outcome.status;
            match state.commit(update) {
                Ok(()) => state.transition(&node, status)?,
                Err(e) if e.is_fatal() => {
                    branches.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!("{} rejected at {}: {}", node, merge, e);
                    state.transition(&node, StageStatus::Failed)?;
                }
            }
            emit(events, state, &node).await;
        }

        state.transition(merge, StageStatus::Completed)?;
        emit(events, state, merge).await;
        Ok(())
    }
}
