//! Textual evidence from the auxiliary document.
//!
//! The document is split into overlapping character chunks and searched for
//! four families of key terms. A family counts as explained when a
//! definition phrase follows one of its terms closely.

use super::{record_id, Evaluator};
use crate::context::AuditContext;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;
use tracing::info;
use tribunal_common::{AuditError, EvidenceCategory, EvidenceRecord, ReasonCode};

pub const CHUNK_SIZE: usize = 2000;
pub const CHUNK_OVERLAP: usize = 200;
/// Characters after a term searched for a definition phrase
const EXPLANATION_WINDOW: usize = 80;

pub const KEY_TERMS: &[(&str, &[&str])] = &[
    ("dialectical_synthesis", &["dialectical synthesis", "dialectical", "synthesis"]),
    (
        "fan_in_out",
        &["fan-in", "fan-out", "fan in", "fan out", "parallel execution", "parallel branching"],
    ),
    ("metacognition", &["metacognition", "meta-cognition", "self-awareness", "self-reflection"]),
    (
        "state_synchronization",
        &["state synchronization", "state sync", "synchronizing state", "state consistency"],
    ),
];

static EXPLANATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(is defined as|refers to|means|is a|represents|describes)").unwrap());

/// Overlapping chunks of `size` characters, each starting `size - overlap` after the last
pub fn chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct TermStats {
    mentions: usize,
    explained: usize,
}

fn search(chunks: &[String]) -> Vec<(&'static str, TermStats)> {
    KEY_TERMS
        .iter()
        .map(|(family, variants)| {
            let mut stats = TermStats::default();
            for chunk in chunks {
                let lower = chunk.to_lowercase();
                for variant in variants.iter() {
                    for (idx, _) in lower.match_indices(variant) {
                        stats.mentions += 1;
                        let after: String = lower[idx + variant.len()..].chars().take(EXPLANATION_WINDOW).collect();
                        if EXPLANATION.is_match(&after) {
                            stats.explained += 1;
                        }
                    }
                }
            }
            (*family, stats)
        })
        .collect()
}

pub struct DocAnalyst {
    id: String,
}

impl DocAnalyst {
    pub fn new() -> Self {
        Self {
            id: "docs".to_string(),
        }
    }
}

impl Default for DocAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Evaluator for DocAnalyst {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> EvidenceCategory {
        EvidenceCategory::Textual
    }

    async fn evaluate(&self, ctx: &AuditContext) -> Result<Vec<EvidenceRecord>, AuditError> {
        let path = ctx.document_path()?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AuditError::tool(ReasonCode::MissingInput, format!("{}: {}", path.display(), e)))?;
        let text = String::from_utf8(bytes).map_err(|_| {
            AuditError::tool(
                ReasonCode::MissingInput,
                format!("{} is not a text document", path.display()),
            )
        })?;

        let chunks = chunk(&text, CHUNK_SIZE, CHUNK_OVERLAP);
        let found = search(&chunks);

        let mut capabilities = Map::new();
        let mut terms = Map::new();
        for (family, stats) in &found {
            capabilities.insert(family.to_string(), Value::Bool(stats.mentions > 0));
            capabilities.insert(format!("{}_explained", family), Value::Bool(stats.explained > 0));
            terms.insert(
                family.to_string(),
                json!({ "mentions": stats.mentions, "explained": stats.explained }),
            );
        }

        let covered = found.iter().filter(|(_, s)| s.mentions > 0).count();
        info!(
            "Document {}: {} chunks, {}/{} term families present",
            path.display(),
            chunks.len(),
            covered,
            KEY_TERMS.len()
        );

        Ok(vec![EvidenceRecord::new(
            record_id(&self.id, self.category(), 0),
            self.id.as_str(),
            self.category(),
            json!({ "capabilities": capabilities, "terms": terms, "chunks": chunks.len() }),
            if chunks.is_empty() { 0.2 } else { 0.8 },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_chunks_overlap() {
        let text = "a".repeat(4500);
        let chunks = chunk(&text, 2000, 200);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2000);
        assert_eq!(chunks[2].len(), 4500 - 3600);
        assert!(chunk("", 2000, 200).is_empty());
    }

    #[test]
    fn test_explained_vs_mentioned() {
        let chunks = vec![
            "Metacognition refers to the system reasoning about its own reasoning. We also use fan-out.".to_string(),
        ];
        let found = search(&chunks);
        let get = |name: &str| found.iter().find(|(f, _)| *f == name).map(|(_, s)| *s).unwrap();

        assert_eq!(get("metacognition").explained, 1);
        assert_eq!(get("fan_in_out").mentions, 1);
        assert_eq!(get("fan_in_out").explained, 0);
        assert_eq!(get("state_synchronization").mentions, 0);
    }

    #[tokio::test]
    async fn test_document_record() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("report.md");
        fs::write(&doc, "# Report\nDialectical synthesis means weighing thesis and antithesis.\n").unwrap();

        let ctx = AuditContext::for_path("run", dir.path()).with_document(&doc);
        let records = DocAnalyst::new().evaluate(&ctx).await.unwrap();

        assert_eq!(records[0].id, "docs:textual:0");
        assert_eq!(records[0].capability("dialectical_synthesis"), Some(true));
        assert_eq!(records[0].capability("dialectical_synthesis_explained"), Some(true));
        assert_eq!(records[0].capability("metacognition"), Some(false));
    }

    #[tokio::test]
    async fn test_binary_document_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("report.pdf");
        fs::write(&doc, [0x25, 0x50, 0xff, 0xfe, 0x00]).unwrap();

        let ctx = AuditContext::for_path("run", dir.path()).with_document(&doc);
        let err = DocAnalyst::new().evaluate(&ctx).await.unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::MissingInput);
    }
}
