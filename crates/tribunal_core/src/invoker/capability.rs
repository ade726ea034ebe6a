//! The reasoning-service seam.

use async_trait::async_trait;
use std::fmt;
use tribunal_common::ReasonCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningRequest {
    pub system: String,
    pub prompt: String,
    /// Validation errors from earlier attempts, oldest first
    pub feedback: Vec<String>,
}

impl ReasoningRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            feedback: Vec::new(),
        }
    }

    /// Same request plus the errors the last response was rejected for
    pub fn with_feedback(&self, errors: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.feedback.push(errors.into());
        next
    }

    /// Prompt text as sent, including any feedback
    pub fn render_prompt(&self) -> String {
        if self.feedback.is_empty() {
            return self.prompt.clone();
        }
        let mut out = self.prompt.clone();
        out.push_str("\n\nYour previous response was rejected. Fix these problems and reply with JSON only:\n");
        for errors in &self.feedback {
            out.push_str("- ");
            out.push_str(errors);
            out.push('\n');
        }
        out
    }
}

/// Why one call to a reasoning service failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityFailure {
    Transport(String),
    Authentication(String),
    Timeout,
}

impl CapabilityFailure {
    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::Transport(_) => ReasonCode::Transport,
            Self::Authentication(_) => ReasonCode::Authentication,
            Self::Timeout => ReasonCode::Timeout,
        }
    }
}

impl fmt::Display for CapabilityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport failure: {}", msg),
            Self::Authentication(msg) => write!(f, "authentication failure: {}", msg),
            Self::Timeout => f.write_str("reasoning service timed out"),
        }
    }
}

/// An untrusted service that turns a prompt into text
#[async_trait]
pub trait ReasoningCapability: Send + Sync {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, CapabilityFailure>;

    /// Name used in logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_accumulates() {
        let request = ReasoningRequest::new("sys", "Score the repo.");
        assert_eq!(request.render_prompt(), "Score the repo.");

        let retried = request
            .with_feedback("$.score: missing")
            .with_feedback("$.argument: missing");
        let prompt = retried.render_prompt();
        assert!(prompt.starts_with("Score the repo."));
        assert!(prompt.contains("- $.score: missing\n"));
        assert!(prompt.contains("- $.argument: missing\n"));
        assert!(request.feedback.is_empty());
    }
}
