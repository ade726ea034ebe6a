//! External reasoner invoker.
//!
//! Calls a `ReasoningCapability` under a per-attempt timeout, extracts and
//! validates the JSON it returns, and retries within a fixed bound. The result
//! is always an `Invocation`: a validated value or a gap with a reason code.

pub mod capability;
pub mod fake;
pub mod ollama;
pub mod parse;
pub mod retry;

pub use capability::{CapabilityFailure, ReasoningCapability, ReasoningRequest};
pub use fake::{FakeCapability, FakeCapabilityBuilder, FakeReply};
pub use ollama::OllamaCapability;
pub use retry::{AttemptResult, Backoff, Invocation, RetryState, Step};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use tribunal_common::{InvokerConfig, Schema};

#[derive(Clone)]
pub struct ReasonerInvoker {
    capability: Arc<dyn ReasoningCapability>,
    max_attempts: u32,
    attempt_timeout: Duration,
    backoff: Backoff,
}

impl ReasonerInvoker {
    pub fn new(capability: Arc<dyn ReasoningCapability>, config: &InvokerConfig) -> Self {
        Self {
            capability,
            max_attempts: config.max_attempts,
            attempt_timeout: config.attempt_timeout(),
            backoff: Backoff::from_config(config),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn invoke(&self, request: &ReasoningRequest, schema: &Schema) -> Invocation {
        let mut state = RetryState::new(self.max_attempts);
        let mut request = request.clone();

        loop {
            let result = self.attempt(&request, schema).await;
            match state.record(result, &self.backoff) {
                Step::Done(invocation) => {
                    match &invocation {
                        Invocation::Valid { attempts, .. } => {
                            debug!("[{}] valid response after {} attempt(s)", self.capability.name(), attempts)
                        }
                        Invocation::Gap { reason, attempts, last_error } => warn!(
                            "[{}] gave up after {} attempt(s) ({}): {}",
                            self.capability.name(),
                            attempts,
                            reason,
                            last_error
                        ),
                    }
                    return invocation;
                }
                Step::Retry { delay, feedback } => {
                    info!(
                        "[{}] attempt {}/{} rejected: {}",
                        self.capability.name(),
                        state.attempt,
                        self.max_attempts,
                        state.last_error.as_deref().unwrap_or("unknown")
                    );
                    if let Some(errors) = feedback {
                        request = request.with_feedback(errors);
                    }
                    if let Some(delay) = delay {
                        debug!("Backing off for {:?} before retry", delay);
                        sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn attempt(&self, request: &ReasoningRequest, schema: &Schema) -> AttemptResult {
        let text = match timeout(self.attempt_timeout, self.capability.reason(request)).await {
            Err(_) => return AttemptResult::Failed(CapabilityFailure::Timeout),
            Ok(Err(failure)) => return AttemptResult::Failed(failure),
            Ok(Ok(text)) => text,
        };

        let value = match parse::parse_response(&text) {
            Ok(value) => value,
            Err(e) => return AttemptResult::Invalid(e),
        };

        match schema.validate(&value) {
            Ok(()) => AttemptResult::Valid(value),
            Err(violations) => AttemptResult::Invalid(violations.to_string()),
        }
    }
}
