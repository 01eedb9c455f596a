//! Configuration for Tuneforge.
//!
//! Loaded from TOML, global then local, with a few environment overrides on
//! top:
//!
//! ```toml
//! log_level = "info"
//!
//! [retrieval]
//! streaming_enabled = true
//! default_batch_size = 32
//!
//! [jobs]
//! max_concurrent_jobs = 2
//! cancel_grace_period_secs = 30
//!
//! [evaluation]
//! approval_threshold = 85.0
//! criteria = [{ name = "accuracy", weight = 0.6 }, { name = "tone", weight = 0.4 }]
//!
//! [collaborators]
//! search_url = "http://localhost:8700/search"
//! ```

use crate::error::{ForgeError, Result};
use crate::evaluation::{
    DEFAULT_EVALUATION_CONCURRENCY, DEFAULT_PASS_THRESHOLD, EvaluatorSettings, Rubric,
};
use crate::retrieval::{DEFAULT_BATCH_SIZE, QualityScorer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tuneforge_orchestrator::JobManagerConfig;
use tuneforge_training::ForgeLayout;

pub const ENV_STREAMING_ENABLED: &str = "TUNEFORGE_STREAMING_ENABLED";
pub const ENV_BATCH_SIZE: &str = "TUNEFORGE_BATCH_SIZE";
pub const ENV_MAX_CONCURRENT_JOBS: &str = "TUNEFORGE_MAX_CONCURRENT_JOBS";
pub const ENV_APPROVAL_THRESHOLD: &str = "TUNEFORGE_APPROVAL_THRESHOLD";

/// Retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Write corpora record by record instead of collecting first.
    pub streaming_enabled: bool,
    pub default_batch_size: usize,
    pub quality: QualityScorer,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            streaming_enabled: true,
            default_batch_size: DEFAULT_BATCH_SIZE,
            quality: QualityScorer::default(),
        }
    }
}

/// Job manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub max_concurrent_jobs: usize,
    pub cancel_grace_period_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        let defaults = JobManagerConfig::default();
        Self {
            max_concurrent_jobs: defaults.max_concurrent_jobs,
            cancel_grace_period_secs: defaults.cancel_grace_period.as_secs(),
        }
    }
}

impl JobsConfig {
    #[must_use]
    pub fn manager_config(&self) -> JobManagerConfig {
        JobManagerConfig {
            max_concurrent_jobs: self.max_concurrent_jobs,
            cancel_grace_period: Duration::from_secs(self.cancel_grace_period_secs),
            ..JobManagerConfig::default()
        }
    }
}

/// Evaluation and approval policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Aggregate score (0-100) at which the pipeline approves.
    pub approval_threshold: f64,
    /// Per-sample aggregate counted as a pass.
    pub pass_threshold: f64,
    /// Reject instead of leaving pending when below the approval threshold.
    pub auto_reject: bool,
    pub concurrency: usize,
    pub criteria: Rubric,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            approval_threshold: 85.0,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            auto_reject: false,
            concurrency: DEFAULT_EVALUATION_CONCURRENCY,
            criteria: Rubric::default(),
        }
    }
}

impl EvaluationConfig {
    #[must_use]
    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            rubric: self.criteria.clone(),
            pass_threshold: self.pass_threshold,
            concurrency: self.concurrency,
        }
    }
}

/// Where the external collaborators live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    /// HTTP search endpoint.
    pub search_url: Option<String>,
    /// Local JSONL document file, used when no search URL is set.
    pub search_file: Option<PathBuf>,
    pub inference_url: Option<String>,
    pub judge_url: Option<String>,
    /// Program run once per training job.
    pub trainer_command: Option<String>,
    pub trainer_args: Vec<String>,
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub log_level: Option<String>,
    /// Workspace root; `.tuneforge/` lives under it. Defaults to the current
    /// directory.
    pub workspace: Option<PathBuf>,
    pub retrieval: RetrievalConfig,
    pub jobs: JobsConfig,
    pub evaluation: EvaluationConfig,
    pub collaborators: CollaboratorsConfig,
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ForgeError::Config(format!("{}: {}", path.display(), e)))?;
    content.parse::<toml::Table>().map_err(|e| ForgeError::Config(format!("{}: {}", path.display(), e)))
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| ForgeError::Config(format!("{name}={raw}: {e}")))
}

impl ForgeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ForgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForgeError::Config(format!("configuration file not found: {}", path.display())));
        }
        Self::from_layers(&[path.to_path_buf()])
    }

    /// Merges the given files in order, later keys overriding earlier ones at
    /// any depth. Missing files are skipped.
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in paths.iter().filter(|p| p.exists()) {
            merge_tables(&mut merged, read_table(path)?);
        }
        let config: Self = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ForgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.tuneforge/config.toml`
    #[must_use]
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".tuneforge")
            .join("config.toml")
    }

    /// `./tuneforge.toml`
    #[must_use]
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("tuneforge.toml")
    }

    /// Loads global then local config, then applies environment overrides.
    pub fn discover_and_load() -> Result<Self> {
        let mut config = Self::from_layers(&[Self::default_global_path(), Self::default_local_path()])?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `TUNEFORGE_*` overrides read through `lookup`, then revalidates.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_STREAMING_ENABLED) {
            self.retrieval.streaming_enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ForgeError::Config(format!("{ENV_STREAMING_ENABLED}={other}: expected a boolean")));
                }
            };
        }
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            self.retrieval.default_batch_size = parse_env(ENV_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT_JOBS) {
            self.jobs.max_concurrent_jobs = parse_env(ENV_MAX_CONCURRENT_JOBS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_APPROVAL_THRESHOLD) {
            self.evaluation.approval_threshold = parse_env(ENV_APPROVAL_THRESHOLD, &raw)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ForgeError::Config(msg));

        if self.retrieval.default_batch_size == 0 {
            return invalid("retrieval.default_batch_size must be at least 1".to_string());
        }
        self.retrieval.quality.validate().map_err(|e| ForgeError::Config(format!("retrieval.quality: {e}")))?;
        if self.jobs.max_concurrent_jobs == 0 {
            return invalid("jobs.max_concurrent_jobs must be at least 1".to_string());
        }
        for (name, value) in [
            ("evaluation.approval_threshold", self.evaluation.approval_threshold),
            ("evaluation.pass_threshold", self.evaluation.pass_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return invalid(format!("{name} {value} outside 0-100"));
            }
        }
        if self.evaluation.concurrency == 0 {
            return invalid("evaluation.concurrency must be at least 1".to_string());
        }
        self.evaluation.criteria.validate().map_err(|e| ForgeError::Config(format!("evaluation.criteria: {e}")))?;
        Ok(())
    }

    #[must_use]
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    #[must_use]
    pub fn layout(&self) -> ForgeLayout {
        ForgeLayout::for_workspace_root(&self.workspace_root())
    }
}
