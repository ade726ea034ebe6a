//! Historical evidence from `git log`.

use super::{record_id, Evaluator};
use crate::context::AuditContext;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::info;
use tribunal_common::{AuditError, EvidenceCategory, EvidenceRecord, ReasonCode};

/// More commits than this counts as iterative development
const ITERATIVE_THRESHOLD: usize = 3;
/// Commits listed in the payload
const MAX_LISTED: usize = 20;

#[derive(Debug, Clone, PartialEq)]
struct Commit {
    hash: String,
    subject: String,
    date: String,
}

fn parse_log(stdout: &str) -> Vec<Commit> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '|');
            Some(Commit {
                hash: parts.next()?.to_string(),
                date: parts.next()?.to_string(),
                subject: parts.next()?.to_string(),
            })
        })
        .collect()
}

pub struct HistoryInvestigator {
    id: String,
    git_timeout: Duration,
}

impl HistoryInvestigator {
    pub fn new(git_timeout: Duration) -> Self {
        Self {
            id: "history".to_string(),
            git_timeout,
        }
    }
}

#[async_trait]
impl Evaluator for HistoryInvestigator {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> EvidenceCategory {
        EvidenceCategory::Historical
    }

    async fn evaluate(&self, ctx: &AuditContext) -> Result<Vec<EvidenceRecord>, AuditError> {
        let repo = ctx.repo_path()?;
        let mut cmd = Command::new("git");
        cmd.args(["log", "--reverse", "--format=%h|%ad|%s", "--date=short"])
            .current_dir(repo)
            .kill_on_drop(true);

        let output = match timeout(self.git_timeout, cmd.output()).await {
            Err(_) => {
                return Err(AuditError::tool(
                    ReasonCode::Timeout,
                    format!("git log exceeded {:?}", self.git_timeout),
                ))
            }
            Ok(Err(e)) => return Err(AuditError::tool(ReasonCode::Transport, format!("git not runnable: {}", e))),
            Ok(Ok(output)) => output,
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuditError::tool(
                ReasonCode::MissingInput,
                format!("git log failed: {}", stderr.trim()),
            ));
        }

        let commits = parse_log(&String::from_utf8_lossy(&output.stdout));
        info!("Read {} commits from {}", commits.len(), repo.display());

        let listed: Vec<_> = commits
            .iter()
            .take(MAX_LISTED)
            .map(|c| json!({ "hash": c.hash, "date": c.date, "subject": c.subject }))
            .collect();
        let payload = json!({
            "capabilities": {
                "iterative_history": commits.len() > ITERATIVE_THRESHOLD,
            },
            "commit_count": commits.len(),
            "commits": listed,
        });

        Ok(vec![EvidenceRecord::new(
            record_id(&self.id, self.category(), 0),
            self.id.as_str(),
            self.category(),
            payload,
            0.9,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_keeps_pipes_in_subject() {
        let commits = parse_log("a1b2c3d|2024-01-02|init\ne4f5a6b|2024-01-03|fix: a | b\nbroken line\n");
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[1].subject, "fix: a | b");
        assert_eq!(commits[0].date, "2024-01-02");
    }

    #[tokio::test]
    async fn test_non_repository_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AuditContext::for_path("run", dir.path());
        let err = HistoryInvestigator::new(Duration::from_secs(10))
            .evaluate(&ctx)
            .await
            .unwrap_err();
        // git absent on the host reports transport instead
        assert!(matches!(
            err.reason_code(),
            ReasonCode::MissingInput | ReasonCode::Transport
        ));
    }
}
