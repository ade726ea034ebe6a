//! Configuration for audit runs.
//!
//! Loads settings from a TOML file or uses defaults. Every field has its own
//! default so partial files are accepted.

use crate::opinion::{Persona, SCORE_MAX, SCORE_MIN};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file looked up when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "tribunal.toml";

/// Per-branch wall-clock limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Evaluator branch timeout in seconds
    #[serde(default = "default_evaluator_timeout")]
    pub evaluator_timeout_secs: u64,

    /// Judge branch timeout in seconds (covers every reasoner attempt)
    #[serde(default = "default_judge_timeout")]
    pub judge_timeout_secs: u64,
}

fn default_evaluator_timeout() -> u64 {
    300 // clone + history on large repos
}

fn default_judge_timeout() -> u64 {
    240
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            evaluator_timeout_secs: default_evaluator_timeout(),
            judge_timeout_secs: default_judge_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn evaluator_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluator_timeout_secs)
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_secs(self.judge_timeout_secs)
    }
}

/// Retry policy for the reasoner invoker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Hard timeout per attempt in milliseconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter_percent: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_attempt_timeout() -> u64 {
    60_000
}

fn default_backoff_base() -> u64 {
    250
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_backoff_max() -> u64 {
    5_000
}

fn default_jitter() -> f64 {
    0.20
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout(),
            backoff_base_ms: default_backoff_base(),
            backoff_factor: default_backoff_factor(),
            backoff_max_ms: default_backoff_max(),
            jitter_percent: default_jitter(),
        }
    }
}

impl InvokerConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Persona weights used by weighted aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    #[serde(default = "default_weight_one")]
    pub adversarial: f64,

    #[serde(default = "default_weight_one")]
    pub optimistic: f64,

    #[serde(default = "default_weight_pragmatic")]
    pub pragmatic: f64,
}

fn default_weight_one() -> f64 {
    1.0
}

fn default_weight_pragmatic() -> f64 {
    2.0
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            adversarial: default_weight_one(),
            optimistic: default_weight_one(),
            pragmatic: default_weight_pragmatic(),
        }
    }
}

impl WeightTable {
    pub fn weight(&self, persona: Persona) -> f64 {
        match persona {
            Persona::Adversarial => self.adversarial,
            Persona::Optimistic => self.optimistic,
            Persona::Pragmatic => self.pragmatic,
        }
    }
}

/// Policy constants for the Chief Justice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Score cap when a security violation is present
    #[serde(default = "default_security_ceiling")]
    pub security_ceiling: f64,

    /// Score given when no usable opinion remains
    #[serde(default = "default_floor")]
    pub floor_score: f64,

    /// Population variance above which dissent is reported
    #[serde(default = "default_dissent_threshold")]
    pub dissent_variance_threshold: f64,

    /// Decimal places kept in the final score
    #[serde(default = "default_precision")]
    pub precision: u32,

    #[serde(default)]
    pub weights: WeightTable,
}

fn default_security_ceiling() -> f64 {
    3.0
}

fn default_floor() -> f64 {
    1.0
}

fn default_dissent_threshold() -> f64 {
    2.0
}

fn default_precision() -> u32 {
    1
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            security_ceiling: default_security_ceiling(),
            floor_score: default_floor(),
            dissent_variance_threshold: default_dissent_threshold(),
            precision: default_precision(),
            weights: WeightTable::default(),
        }
    }
}

/// External reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    #[serde(default = "default_reasoner_url")]
    pub url: String,

    #[serde(default = "default_reasoner_model")]
    pub model: String,

    /// HTTP client timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_reasoner_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_reasoner_model() -> String {
    "llama3.2".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_temperature() -> f64 {
    0.3
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            url: default_reasoner_url(),
            model: default_reasoner_model(),
            request_timeout_secs: default_request_timeout(),
            temperature: default_temperature(),
        }
    }
}

/// Which judges sit on the bench
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgesConfig {
    #[serde(default = "default_enabled_judges")]
    pub enabled: Vec<String>,
}

fn default_enabled_judges() -> Vec<String> {
    vec![
        "prosecutor".to_string(),
        "defense".to_string(),
        "tech_lead".to_string(),
    ]
}

impl Default for JudgesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_judges(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditorConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub invoker: InvokerConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub reasoner: ReasonerConfig,

    #[serde(default)]
    pub judges: JudgesConfig,
}

impl AuditorConfig {
    /// Load from `path`, or from the default path, falling back to defaults
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        Self::load_from_path(path).unwrap_or_else(|e| {
            warn!("Config not loaded from {}, using defaults: {:#}", path.display(), e);
            AuditorConfig::default()
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AuditorConfig = toml::from_str(content).context("Invalid config TOML")?;
        config.check()?;
        Ok(config)
    }

    /// Write the default config to `path`
    pub fn save_default(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&AuditorConfig::default())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.invoker.max_attempts == 0 {
            anyhow::bail!("invoker.max_attempts must be at least 1");
        }
        let w = &self.policy.weights;
        if [w.adversarial, w.optimistic, w.pragmatic]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            anyhow::bail!("policy.weights must be finite and non-negative");
        }
        if self.policy.precision > 6 {
            anyhow::bail!("policy.precision must be at most 6");
        }

        let policy = &self.policy;
        for (name, value) in [
            ("security_ceiling", policy.security_ceiling),
            ("floor_score", policy.floor_score),
        ] {
            if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                anyhow::bail!("policy.{} must lie in [{}, {}], got {}", name, SCORE_MIN, SCORE_MAX, value);
            }
        }
        if policy.floor_score > policy.security_ceiling {
            anyhow::bail!("policy.floor_score must not exceed policy.security_ceiling");
        }
        if !policy.dissent_variance_threshold.is_finite() || policy.dissent_variance_threshold < 0.0 {
            anyhow::bail!("policy.dissent_variance_threshold must be finite and non-negative");
        }
        Ok(())
    }
}
