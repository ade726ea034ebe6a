//! Structural evidence from the source tree.

use super::{record_id, Evaluator};
use crate::context::AuditContext;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};
use tribunal_common::{AuditError, EvidenceCategory, EvidenceRecord, Flag, ReasonCode};
use walkdir::WalkDir;

const SCANNED_EXTENSIONS: &[&str] = &["py", "rs", "ts", "js", "go"];
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "venv", "__pycache__", "dist"];
const MAX_FILE_BYTES: u64 = 1024 * 1024;
const MAX_FINDINGS: usize = 50;

/// Capability name and the pattern that shows it
static CAPABILITY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "parallel_fan_out",
            Regex::new(r"add_conditional_edges|\bSend\(|asyncio\.gather|ThreadPoolExecutor|JoinSet|join_all|tokio::spawn")
                .unwrap(),
        ),
        (
            "fan_in_barrier",
            Regex::new(r"add_edge\(\s*\[|\.join_next\(|join_all|asyncio\.gather|Barrier").unwrap(),
        ),
        (
            "state_reducers",
            Regex::new(r"operator\.(add|ior)|Annotated\[|\breducer\b|impl\s+Reducer").unwrap(),
        ),
        (
            "typed_state",
            Regex::new(r"TypedDict|BaseModel|class\s+\w*State\b|struct\s+\w*State\b").unwrap(),
        ),
    ]
});

/// Raw shell execution
static SHELL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"os\.system\(|shell\s*=\s*True|\beval\(|Command::new\("(sh|bash)"\)"#).unwrap()
});

pub struct RepoInvestigator {
    id: String,
}

impl RepoInvestigator {
    pub fn new() -> Self {
        Self {
            id: "repo".to_string(),
        }
    }
}

impl Default for RepoInvestigator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_skipped(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| SKIPPED_DIRS.contains(&n))
        .unwrap_or(false)
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SCANNED_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct Scan {
    files: usize,
    capabilities: Map<String, Value>,
    findings: Vec<String>,
    shell_hits: Vec<String>,
}

fn scan(root: &Path) -> Scan {
    let mut out = Scan::default();
    for (name, _) in CAPABILITY_PATTERNS.iter() {
        out.capabilities.insert(name.to_string(), Value::Bool(false));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_skipped(e.path())));

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_source(path) {
            continue;
        }
        if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
            continue;
        }
        let Ok(source) = fs::read_to_string(path) else {
            debug!("Skipping unreadable {}", path.display());
            continue;
        };

        out.files += 1;
        let relative = path.strip_prefix(root).unwrap_or(path).display().to_string();

        for (name, pattern) in CAPABILITY_PATTERNS.iter() {
            if pattern.is_match(&source) {
                out.capabilities.insert(name.to_string(), Value::Bool(true));
                if out.findings.len() < MAX_FINDINGS {
                    out.findings.push(format!("{}: {}", name, relative));
                }
            }
        }
        if SHELL_PATTERN.is_match(&source) {
            out.shell_hits.push(relative);
        }
    }
    out
}

#[async_trait]
impl Evaluator for RepoInvestigator {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> EvidenceCategory {
        EvidenceCategory::Structural
    }

    async fn evaluate(&self, ctx: &AuditContext) -> Result<Vec<EvidenceRecord>, AuditError> {
        let root = ctx.repo_path()?.to_path_buf();
        let result = tokio::task::spawn_blocking(move || scan(&root))
            .await
            .map_err(|e| AuditError::tool(ReasonCode::Panicked, e.to_string()))?;

        info!(
            "Scanned {} source files, {} shell hit(s)",
            result.files,
            result.shell_hits.len()
        );

        let confidence = if result.files > 0 { 0.9 } else { 0.3 };
        let mut findings = result.findings;
        findings.extend(result.shell_hits.iter().map(|p| format!("raw_shell: {}", p)));

        let mut record = EvidenceRecord::new(
            record_id(&self.id, self.category(), 0),
            self.id.as_str(),
            self.category(),
            json!({
                "capabilities": result.capabilities,
                "files_scanned": result.files,
                "findings": findings,
            }),
            confidence,
        );
        if !result.shell_hits.is_empty() {
            record = record.with_flag(Flag::SecurityViolation);
        }
        Ok(vec![record])
    }
}
