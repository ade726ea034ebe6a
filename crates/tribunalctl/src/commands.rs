//! Command execution.

use crate::cli::Commands;
use crate::output;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;
use tribunal_common::config::DEFAULT_CONFIG_PATH;
use tribunal_common::{AuditError, AuditorConfig};
use tribunal_core::context::{DocumentDescriptor, TargetDescriptor};
use tribunal_core::invoker::OllamaCapability;
use tribunal_core::{evaluators, judges, report, AuditGraph, AuditInput, AuditOutcome, ReasonerInvoker, RunEvent};

pub struct RunArgs {
    pub repo: String,
    pub branch: Option<String>,
    pub doc: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub trace: bool,
}

/// An explicit path must load; the default path is optional
pub fn load_config(path: Option<&Path>) -> Result<AuditorConfig> {
    let loaded = match path {
        Some(path) => AuditorConfig::load_from_path(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AuditorConfig::load_from_path(Path::new(DEFAULT_CONFIG_PATH)),
        None => return Ok(AuditorConfig::default()),
    };
    loaded.map_err(|e| AuditError::Config(format!("{:#}", e)).into())
}

pub fn build_graph(config: &AuditorConfig) -> Result<AuditGraph> {
    let capability = Arc::new(OllamaCapability::new(&config.reasoner));
    let invoker = ReasonerInvoker::new(capability, &config.invoker);
    let bench = judges::from_config(&config.judges.enabled, &invoker)?;
    let investigators = evaluators::standard(config.scheduler.evaluator_timeout());

    info!(
        "Seated {} judge(s) on {} with {} evaluator(s)",
        bench.len(),
        config.reasoner.model,
        investigators.len()
    );
    Ok(AuditGraph::new(investigators, bench, config))
}

pub fn audit_input(repo: &str, branch: Option<String>, doc: Option<PathBuf>) -> AuditInput {
    AuditInput {
        target: TargetDescriptor::parse(repo, branch),
        document: doc.map(DocumentDescriptor::new),
    }
}

async fn execute(graph: &AuditGraph, input: AuditInput, trace: bool) -> Result<AuditOutcome> {
    if !trace {
        return Ok(graph.run(input).await?);
    }

    let mut events = graph.stream(input);
    while let Some(event) = events.next().await {
        match event {
            RunEvent::StageCompleted { node, status, snapshot } => output::print_stage(&node, status, &snapshot),
            RunEvent::Finished(outcome) => return Ok(*outcome),
            RunEvent::Aborted(e) => return Err(e.into()),
        }
    }
    Err(AuditError::Scheduler("run ended without an outcome".to_string()).into())
}

/// Returns the process exit code
pub async fn run(args: RunArgs, config: &AuditorConfig) -> Result<i32> {
    let graph = build_graph(config)?;
    let input = audit_input(&args.repo, args.branch, args.doc);
    let outcome = execute(&graph, input, args.trace).await?;

    if let Some(path) = &args.output {
        std::fs::write(path, report::render_markdown(&outcome))
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        output::print_summary(&outcome);
    }

    Ok(outcome.exit_code())
}

pub fn config_init(path: &Path) -> Result<i32> {
    AuditorConfig::save_default(path)?;
    println!("Default config written to {}", path.display());
    Ok(0)
}

/// Run one command. `config --init` never reads the existing config, so it
/// can replace a malformed file.
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<i32> {
    match command {
        Commands::Config { init } => config_init(&init),
        Commands::Run { repo, branch, doc, output, json, trace } => {
            let config = load_config(config_path)?;
            let args = RunArgs {
                repo,
                branch,
                doc,
                output,
                json,
                trace,
            };
            run(args, &config).await
        }
    }
}
