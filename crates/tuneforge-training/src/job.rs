use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// Identifier for a training job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Fine-tuning strategy requested from the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerType {
    Lora,
    Qlora,
    Dora,
    Full,
}

impl TrainerType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lora => "lora",
            Self::Qlora => "qlora",
            Self::Dora => "dora",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for TrainerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrainerType {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lora" => Ok(Self::Lora),
            "qlora" => Ok(Self::Qlora),
            "dora" => Ok(Self::Dora),
            "full" => Ok(Self::Full),
            other => Err(TrainingError::InvalidSpec(format!("unknown trainer type: {other}"))),
        }
    }
}

/// Job submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSubmission {
    pub trainer_type: TrainerType,
    /// Reference to the trainer configuration (path, preset name, ...).
    pub config_ref: String,
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,
    /// 1 (lowest) ..= 10 (highest).
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    5
}

impl JobSubmission {
    #[must_use]
    pub fn new(trainer_type: TrainerType, config_ref: impl Into<String>) -> Self {
        Self {
            trainer_type,
            config_ref: config_ref.into(),
            dataset_path: None,
            priority: default_priority(),
        }
    }

    #[must_use]
    pub fn with_dataset(mut self, path: PathBuf) -> Self {
        self.dataset_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.config_ref.trim().is_empty() {
            return Err(TrainingError::InvalidSpec("config_ref is required".to_string()));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(TrainingError::InvalidSpec(format!(
                "priority must be within {MIN_PRIORITY}..={MAX_PRIORITY}, got {}",
                self.priority
            )));
        }
        if let Some(path) = &self.dataset_path {
            if path.as_os_str().is_empty() {
                return Err(TrainingError::InvalidSpec("dataset_path must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// What a trainer receives when a job starts running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJob {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    pub trainer_type: TrainerType,
    pub config_ref: String,
    pub dataset_path: Option<PathBuf>,
}

impl TrainingJob {
    #[must_use]
    pub fn new(job_id: JobId, created_at: DateTime<Utc>, submission: &JobSubmission) -> Self {
        Self {
            job_id,
            created_at,
            trainer_type: submission.trainer_type,
            config_ref: submission.config_ref.clone(),
            dataset_path: submission.dataset_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_validate_requires_config_ref() {
        let submission = JobSubmission::new(TrainerType::Lora, "  ");
        assert!(submission.validate().is_err());
    }

    #[test]
    fn test_submission_validate_priority_bounds() {
        let base = JobSubmission::new(TrainerType::Qlora, "presets/small.toml");
        assert!(base.clone().with_priority(0).validate().is_err());
        assert!(base.clone().with_priority(11).validate().is_err());
        assert!(base.clone().with_priority(1).validate().is_ok());
        assert!(base.with_priority(10).validate().is_ok());
    }

    #[test]
    fn test_submission_payload_shape() {
        let json = r#"{"trainer_type": "dora", "config_ref": "cfg", "priority": 7}"#;
        let submission: JobSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.trainer_type, TrainerType::Dora);
        assert_eq!(submission.dataset_path, None);
        assert_eq!(submission.priority, 7);
    }

    #[test]
    fn test_trainer_type_parse() {
        assert_eq!("QLoRA".parse::<TrainerType>().unwrap(), TrainerType::Qlora);
        assert!("adapter".parse::<TrainerType>().is_err());
    }
}
