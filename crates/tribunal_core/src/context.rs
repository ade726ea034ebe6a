//! What a run audits and the context every evaluator reads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};
use tribunal_common::{AuditError, ReasonCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetDescriptor {
    Local {
        path: PathBuf,
    },
    Git {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
}

impl TargetDescriptor {
    /// Remote URLs and `.git` suffixes are treated as git targets
    pub fn parse(spec: &str, branch: Option<String>) -> Self {
        let remote = ["https://", "http://", "git@", "ssh://", "git://"]
            .iter()
            .any(|p| spec.starts_with(p));
        if remote || (spec.ends_with(".git") && !Path::new(spec).exists()) {
            TargetDescriptor::Git {
                url: spec.to_string(),
                branch,
            }
        } else {
            TargetDescriptor::Local {
                path: PathBuf::from(spec),
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Local { path } => path.display().to_string(),
            Self::Git { url, branch: Some(b) } => format!("{}#{}", url, b),
            Self::Git { url, branch: None } => url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub path: PathBuf,
}

impl DocumentDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditInput {
    pub target: TargetDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentDescriptor>,
}

impl AuditInput {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            target: TargetDescriptor::Local { path: path.into() },
            document: None,
        }
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.document = Some(DocumentDescriptor::new(path));
        self
    }
}

/// Resolved input shared read-only by every evaluator branch
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub run_id: String,
    pub input: AuditInput,
    repo: Result<PathBuf, String>,
    /// Keeps a cloned checkout alive for the run
    _checkout: Option<Arc<TempDir>>,
}

impl AuditContext {
    /// Resolve the target. A failed clone is not an error here: evaluators
    /// that need the repository report `missing_input` gaps instead.
    pub async fn prepare(run_id: &str, input: AuditInput, clone_timeout: Duration) -> Self {
        let (repo, checkout) = match &input.target {
            TargetDescriptor::Local { path } => {
                if path.is_dir() {
                    (Ok(path.clone()), None)
                } else {
                    (Err(format!("{} is not a directory", path.display())), None)
                }
            }
            TargetDescriptor::Git { url, branch } => {
                match clone_repo(url, branch.as_deref(), clone_timeout).await {
                    Ok(dir) => (Ok(dir.path().to_path_buf()), Some(Arc::new(dir))),
                    Err(e) => {
                        warn!("Clone of {} failed: {}", url, e);
                        (Err(e.to_string()), None)
                    }
                }
            }
        };

        Self {
            run_id: run_id.to_string(),
            input,
            repo,
            _checkout: checkout,
        }
    }

    /// Context over a local directory, for tests and simulations
    pub fn for_path(run_id: &str, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            run_id: run_id.to_string(),
            input: AuditInput::local(path.clone()),
            repo: Ok(path),
            _checkout: None,
        }
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.input.document = Some(DocumentDescriptor::new(path));
        self
    }

    pub fn repo_path(&self) -> Result<&Path, AuditError> {
        self.repo
            .as_deref()
            .map_err(|e| AuditError::tool(ReasonCode::MissingInput, e.clone()))
    }

    pub fn document_path(&self) -> Result<&Path, AuditError> {
        self.input
            .document
            .as_ref()
            .map(|d| d.path.as_path())
            .ok_or_else(|| AuditError::tool(ReasonCode::MissingInput, "no document supplied"))
    }
}

/// Shallow clone into a fresh temp dir
pub async fn clone_repo(url: &str, branch: Option<&str>, limit: Duration) -> Result<TempDir, AuditError> {
    let dir = tempfile::Builder::new()
        .prefix("tribunal-")
        .tempdir()
        .map_err(|e| AuditError::tool(ReasonCode::Transport, format!("temp dir: {}", e)))?;

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth", "1"]);
    if let Some(branch) = branch {
        cmd.args(["--branch", branch]);
    }
    cmd.arg(url).arg(dir.path()).kill_on_drop(true);

    info!("Cloning {} into {}", url, dir.path().display());
    let output = match timeout(limit, cmd.output()).await {
        Err(_) => return Err(AuditError::tool(ReasonCode::Timeout, format!("git clone exceeded {:?}", limit))),
        Ok(Err(e)) => return Err(AuditError::tool(ReasonCode::Transport, format!("git not runnable: {}", e))),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = if stderr.contains("Authentication failed") || stderr.contains("could not read Username") {
            ReasonCode::Authentication
        } else {
            ReasonCode::Transport
        };
        return Err(AuditError::tool(reason, format!("git clone failed: {}", stderr.trim())));
    }
    Ok(dir)
}
