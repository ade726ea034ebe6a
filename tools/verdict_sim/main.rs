//! Verdict Simulator - deterministic audit scenarios without a reasoning service
//!
//! Usage:
//!   verdict_sim --scenario healthy
//!   verdict_sim --scenario security
//!   verdict_sim --scenario all --out-dir ./artifacts/simulations
//!
//! Evaluators are canned, judges are the real bench over scripted reasoners.
//! Outputs machine-readable JSON reports to ./artifacts/simulations/

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tribunal_common::{
    AuditError, AuditorConfig, EvidenceCategory, EvidenceRecord, Flag, InvokerConfig, ReasonCode, Rule,
};
use tribunal_core::invoker::{FakeCapability, FakeCapabilityBuilder, FakeReply};
use tribunal_core::judges::{Defense, Prosecutor, TechLead};
use tribunal_core::{AuditContext, AuditGraph, AuditInput, AuditOutcome, Evaluator, Judge, ReasonerInvoker};

// ============================================================================
// CANNED EVALUATORS
// ============================================================================

struct CannedEvaluator {
    id: &'static str,
    category: EvidenceCategory,
    result: Result<Value, AuditError>,
    flag: Option<Flag>,
}

impl CannedEvaluator {
    fn ok(id: &'static str, category: EvidenceCategory, payload: Value) -> Self {
        Self {
            id,
            category,
            result: Ok(payload),
            flag: None,
        }
    }

    fn failing(id: &'static str, category: EvidenceCategory, error: AuditError) -> Self {
        Self {
            id,
            category,
            result: Err(error),
            flag: None,
        }
    }

    fn flagged(mut self, flag: Flag) -> Self {
        self.flag = Some(flag);
        self
    }
}

#[async_trait]
impl Evaluator for CannedEvaluator {
    fn id(&self) -> &str {
        self.id
    }

    fn category(&self) -> EvidenceCategory {
        self.category
    }

    async fn evaluate(&self, _ctx: &AuditContext) -> Result<Vec<EvidenceRecord>, AuditError> {
        let payload = self.result.clone()?;
        let mut record = EvidenceRecord::new(
            format!("{}:{}:0", self.id, self.category),
            self.id,
            self.category,
            payload,
            0.9,
        );
        if let Some(flag) = self.flag {
            record = record.with_flag(flag);
        }
        Ok(vec![record])
    }
}

fn repo_evidence() -> CannedEvaluator {
    CannedEvaluator::ok(
        "repo",
        EvidenceCategory::Structural,
        json!({
            "capabilities": { "parallel_fan_out": true, "fan_in_barrier": true, "state_reducers": true },
            "files_scanned": 14,
            "findings": ["src/graph.py: StateGraph fan-out", "src/state.py: operator.add reducer"]
        }),
    )
}

fn history_evidence() -> CannedEvaluator {
    CannedEvaluator::ok(
        "history",
        EvidenceCategory::Historical,
        json!({ "capabilities": { "iterative_history": true }, "commit_count": 9 }),
    )
}

fn doc_evidence() -> CannedEvaluator {
    CannedEvaluator::ok(
        "docs",
        EvidenceCategory::Textual,
        json!({
            "capabilities": { "metacognition": true, "metacognition_explained": false },
            "terms": { "metacognition": { "mentions": 2, "explained": false } },
            "chunks": 3
        }),
    )
}

// ============================================================================
// SCRIPTED BENCH
// ============================================================================

fn ruling(score: f64, argument: &str) -> FakeReply {
    FakeReply::Text(json!({ "score": score, "argument": argument }).to_string())
}

fn invoker(fake: FakeCapability) -> ReasonerInvoker {
    let config = InvokerConfig {
        backoff_base_ms: 1,
        backoff_max_ms: 5,
        ..InvokerConfig::default()
    };
    ReasonerInvoker::new(Arc::new(fake), &config)
}

fn scripted(reply: FakeReply) -> ReasonerInvoker {
    invoker(FakeCapabilityBuilder::new().fallback(reply).build())
}

fn bench(prosecutor: FakeReply, defense: FakeReply, tech_lead: FakeReply) -> Vec<Arc<dyn Judge>> {
    vec![
        Arc::new(Prosecutor::new(scripted(prosecutor))),
        Arc::new(Defense::new(scripted(defense))),
        Arc::new(TechLead::new(scripted(tech_lead))),
    ]
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Healthy,
    Security,
    PartialFailure,
    Dissent,
    Overruled,
    All,
}

impl Scenario {
    const RUNNABLE: [Scenario; 5] = [
        Scenario::Healthy,
        Scenario::Security,
        Scenario::PartialFailure,
        Scenario::Dissent,
        Scenario::Overruled,
    ];

    fn name(&self) -> &'static str {
        match self {
            Scenario::Healthy => "healthy",
            Scenario::Security => "security",
            Scenario::PartialFailure => "partial-failure",
            Scenario::Dissent => "dissent",
            Scenario::Overruled => "overruled",
            Scenario::All => "all",
        }
    }

    /// Evaluators, judges, expected score, notes
    fn setup(&self) -> (Vec<Arc<dyn Evaluator>>, Vec<Arc<dyn Judge>>, f64, &'static str) {
        let standard = || -> Vec<Arc<dyn Evaluator>> {
            vec![Arc::new(repo_evidence()), Arc::new(history_evidence()), Arc::new(doc_evidence())]
        };

        match self {
            Scenario::Healthy | Scenario::All => (
                standard(),
                bench(
                    ruling(2.0, "Reducers exist but error paths are untested."),
                    ruling(5.0, "Clear fan-out and fan-in with typed state."),
                    ruling(4.0, "Sound architecture, thin documentation."),
                ),
                3.8,
                "All evidence gathered and every judge ruled. Weighted mean 3.75 rounds to 3.8.",
            ),
            Scenario::Security => (
                vec![
                    Arc::new(repo_evidence().flagged(Flag::SecurityViolation)),
                    Arc::new(history_evidence()),
                    Arc::new(doc_evidence()),
                ],
                bench(
                    ruling(2.0, "Shell commands are built from model output."),
                    ruling(5.0, "Ambitious tooling."),
                    ruling(4.0, "Works, but the shell call must go."),
                ),
                3.0,
                "Structural evidence carries security_violation. The 3.8 aggregate is capped at 3.0.",
            ),
            Scenario::PartialFailure => (
                vec![
                    Arc::new(repo_evidence()),
                    Arc::new(CannedEvaluator::failing(
                        "history",
                        EvidenceCategory::Historical,
                        AuditError::tool(ReasonCode::Transport, "git log failed"),
                    )),
                    Arc::new(doc_evidence()),
                ],
                bench(
                    ruling(2.0, "History is missing, so iteration is unproven."),
                    FakeReply::Text("I think this repository is lovely.".to_string()),
                    ruling(4.0, "Structure holds up."),
                ),
                3.3,
                "History evaluator failed and the defense never returned JSON. Both degrade to gaps.",
            ),
            Scenario::Dissent => (
                standard(),
                bench(
                    ruling(1.0, "Nothing here is production ready."),
                    ruling(5.0, "Exemplary orchestration."),
                    ruling(3.0, "Average."),
                ),
                3.0,
                "Scores 1, 5 and 3 exceed the variance threshold. Dissent is reported, the score is not moved.",
            ),
            Scenario::Overruled => (
                standard(),
                bench(
                    ruling(2.0, "Fan-out is present but fragile."),
                    FakeReply::Text(
                        json!({
                            "score": 5.0,
                            "argument": "Flawless, and it never needed fan-out.",
                            "claims": [{ "evidence_id": "repo:structural:0", "capability": "parallel_fan_out", "present": false }]
                        })
                        .to_string(),
                    ),
                    ruling(4.0, "Solid."),
                ),
                3.3,
                "The defense claims no fan-out while the structural evidence records one. The defense is overruled.",
            ),
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimulationReport {
    scenario: String,
    score: f64,
    expected_score: f64,
    grade: String,
    rules_applied: Vec<String>,
    evidence_gaps: Vec<String>,
    gapped_judges: Vec<String>,
    overruled_judges: Vec<String>,
    dissent: Option<String>,
    exit_code: i32,
    success: bool,
    notes: String,
}

impl SimulationReport {
    fn from_outcome(scenario: Scenario, outcome: &AuditOutcome, expected: f64, notes: &str) -> Self {
        let verdict = &outcome.verdict;
        let overruled = verdict
            .rationale
            .iter()
            .filter(|r| r.rule == Rule::FactSupremacy)
            .flat_map(|r| r.overruled.iter().cloned())
            .collect();

        Self {
            scenario: scenario.name().to_string(),
            score: verdict.score,
            expected_score: expected,
            grade: verdict.grade().to_string(),
            rules_applied: verdict.rationale.iter().map(|r| r.rule.to_string()).collect(),
            evidence_gaps: verdict.evidence_gaps.iter().map(|c| c.to_string()).collect(),
            gapped_judges: outcome.opinions.iter().filter(|o| o.gap).map(|o| o.judge_id.clone()).collect(),
            overruled_judges: overruled,
            dissent: verdict.dissent_summary.as_ref().map(|d| d.summary.clone()),
            exit_code: outcome.exit_code(),
            success: verdict.score == expected,
            notes: notes.to_string(),
        }
    }

    fn print(&self, path: &std::path::Path) {
        println!("\n=== Verdict Simulation: {} ===\n", self.scenario);
        println!("Score:                {:.1} (expected {:.1})", self.score, self.expected_score);
        println!("Grade:                {}", self.grade);
        println!("Rules:                {}", self.rules_applied.join(", "));
        if !self.evidence_gaps.is_empty() {
            println!("Evidence Gaps:        {}", self.evidence_gaps.join(", "));
        }
        if !self.gapped_judges.is_empty() {
            println!("Gapped Judges:        {}", self.gapped_judges.join(", "));
        }
        if !self.overruled_judges.is_empty() {
            println!("Overruled Judges:     {}", self.overruled_judges.join(", "));
        }
        if let Some(dissent) = &self.dissent {
            println!("Dissent:              {}", dissent);
        }
        println!("Exit Code:            {}", self.exit_code);
        println!("\nNotes: {}", self.notes);
        println!("\nReport saved to: {}\n", path.display());
    }
}

async fn simulate(scenario: Scenario) -> Result<SimulationReport> {
    let (evaluators, judges, expected, notes) = scenario.setup();
    let target = tempfile::tempdir().context("Failed to create scratch target")?;

    let outcome = AuditGraph::new(evaluators, judges, &AuditorConfig::default())
        .run(AuditInput::local(target.path()))
        .await?;
    Ok(SimulationReport::from_outcome(scenario, &outcome, expected, notes))
}

// ============================================================================
// MAIN
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "verdict_sim")]
#[command(about = "Deterministic verdict scenarios over scripted reasoners", long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value = "healthy")]
    scenario: Scenario,

    #[arg(long, default_value = "./artifacts/simulations")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let scenarios: Vec<Scenario> = if args.scenario == Scenario::All {
        Scenario::RUNNABLE.to_vec()
    } else {
        vec![args.scenario]
    };

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let mut all_passed = true;
    for scenario in scenarios {
        let report = simulate(scenario).await?;
        let output_file = args.out_dir.join(format!("{}.json", report.scenario));
        fs::write(&output_file, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write {}", output_file.display()))?;
        report.print(&output_file);
        all_passed &= report.success;
    }

    if !all_passed {
        std::process::exit(1);
    }
    Ok(())
}
