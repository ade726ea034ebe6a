//! Scripted reasoning capability for deterministic tests and simulations.
//!
//! Replies are served in order. Once the script runs out the fallback reply
//! is repeated.
//!
//! ```rust,ignore
//! let fake = FakeCapabilityBuilder::new()
//!     .reply_text("not json at all")
//!     .reply_json(json!({ "score": 4, "argument": "fine" }))
//!     .build();
//!
//! let invocation = ReasonerInvoker::new(Arc::new(fake.clone()), &config)
//!     .invoke(&request, &Schema::opinion_response())
//!     .await;
//! assert_eq!(fake.call_count(), 2);
//! ```

use super::capability::{CapabilityFailure, ReasoningCapability, ReasoningRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FakeReply {
    Text(String),
    Fail(CapabilityFailure),
    /// Sleep, then answer (used to trip the per-attempt timeout)
    Delayed(Duration, String),
}

#[derive(Debug, Default)]
struct FakeLog {
    script: VecDeque<FakeReply>,
    requests: Vec<ReasoningRequest>,
}

#[derive(Debug, Clone)]
pub struct FakeCapability {
    name: String,
    log: Arc<Mutex<FakeLog>>,
    fallback: FakeReply,
}

fn lock(log: &Mutex<FakeLog>) -> MutexGuard<'_, FakeLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FakeCapability {
    /// Always answers with `value`
    pub fn always_json(value: Value) -> Self {
        FakeCapabilityBuilder::new().fallback(FakeReply::Text(value.to_string())).build()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.log).requests.len()
    }

    /// Requests received, in order
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        lock(&self.log).requests.clone()
    }
}

#[async_trait]
impl ReasoningCapability for FakeCapability {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, CapabilityFailure> {
        let reply = {
            let mut log = lock(&self.log);
            log.requests.push(request.clone());
            log.script.pop_front().unwrap_or_else(|| self.fallback.clone())
        };

        match reply {
            FakeReply::Text(text) => Ok(text),
            FakeReply::Fail(failure) => Err(failure),
            FakeReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct FakeCapabilityBuilder {
    name: String,
    script: VecDeque<FakeReply>,
    fallback: FakeReply,
}

impl Default for FakeCapabilityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCapabilityBuilder {
    pub fn new() -> Self {
        Self {
            name: "fake".to_string(),
            script: VecDeque::new(),
            fallback: FakeReply::Fail(CapabilityFailure::Transport("script exhausted".to_string())),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn reply(mut self, reply: FakeReply) -> Self {
        self.script.push_back(reply);
        self
    }

    pub fn reply_text(self, text: &str) -> Self {
        self.reply(FakeReply::Text(text.to_string()))
    }

    pub fn reply_json(self, value: Value) -> Self {
        self.reply(FakeReply::Text(value.to_string()))
    }

    pub fn fail(self, failure: CapabilityFailure) -> Self {
        self.reply(FakeReply::Fail(failure))
    }

    pub fn fallback(mut self, reply: FakeReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn build(self) -> FakeCapability {
        FakeCapability {
            name: self.name,
            log: Arc::new(Mutex::new(FakeLog {
                script: self.script,
                requests: Vec::new(),
            })),
            fallback: self.fallback,
        }
    }
}
