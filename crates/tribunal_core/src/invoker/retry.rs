//! Bounded retry as an explicit state machine.
//!
//! `RetryState::record` takes the result of one attempt and says what to do
//! next. It never errors: exhausting the bound yields `Invocation::Gap`.

use super::capability::CapabilityFailure;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tribunal_common::{InvokerConfig, ReasonCode};

/// Exponential backoff with symmetric jitter
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub base_ms: u64,
    pub factor: f64,
    pub max_ms: u64,
    pub jitter_percent: f64,
}

impl Backoff {
    pub fn from_config(config: &InvokerConfig) -> Self {
        Self {
            base_ms: config.backoff_base_ms,
            factor: config.backoff_factor,
            max_ms: config.backoff_max_ms,
            jitter_percent: config.jitter_percent,
        }
    }

    /// Delay before retry number `retry` (0-based): base * factor^retry, capped, ±jitter
    pub fn delay(&self, retry: u32) -> Duration {
        let base = (self.base_ms as f64 * self.factor.powi(retry as i32)).min(self.max_ms as f64);

        let jitter_range = base * self.jitter_percent.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((base + jitter).max(0.0) as u64)
    }
}

/// What one attempt produced
#[derive(Debug, Clone)]
pub enum AttemptResult {
    Valid(Value),
    /// Response arrived but failed extraction or validation
    Invalid(String),
    Failed(CapabilityFailure),
}

/// Terminal state of an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Valid {
        value: Value,
        attempts: u32,
    },
    Gap {
        reason: ReasonCode,
        attempts: u32,
        last_error: String,
    },
}

impl Invocation {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Valid { attempts, .. } | Self::Gap { attempts, .. } => *attempts,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Try again after `delay`, appending `feedback` to the request if set
    Retry {
        delay: Option<Duration>,
        feedback: Option<String>,
    },
    Done(Invocation),
}

#[derive(Debug, Clone)]
pub struct RetryState {
    /// Attempts made so far
    pub attempt: u32,
    pub last_error: Option<String>,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            last_error: None,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn record(&mut self, result: AttemptResult, backoff: &Backoff) -> Step {
        self.attempt += 1;

        match result {
            AttemptResult::Valid(value) => Step::Done(Invocation::Valid {
                value,
                attempts: self.attempt,
            }),
            AttemptResult::Invalid(errors) => {
                self.last_error = Some(errors.clone());
                if self.exhausted() {
                    self.gap(ReasonCode::SchemaInvalid)
                } else {
                    Step::Retry {
                        delay: None,
                        feedback: Some(errors),
                    }
                }
            }
            AttemptResult::Failed(failure) => {
                let reason = failure.reason();
                self.last_error = Some(failure.to_string());
                if !reason.is_retryable() || self.exhausted() {
                    self.gap(reason)
                } else {
                    Step::Retry {
                        delay: Some(backoff.delay(self.attempt - 1)),
                        feedback: None,
                    }
                }
            }
        }
    }

    fn gap(&self, reason: ReasonCode) -> Step {
        Step::Done(Invocation::Gap {
            reason,
            attempts: self.attempt,
            last_error: self.last_error.clone().unwrap_or_default(),
        })
    }
}
