use crate::lifecycle::JobState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tuneforge_training::{JobId, JobSubmission, TrainerType, TrainingMetrics};

/// A training run as tracked by the job manager.
///
/// Callers only ever see clones; the manager owns the live record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub trainer_type: TrainerType,
    pub config_ref: String,
    pub dataset_path: Option<PathBuf>,
    pub priority: u8,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once the job completes.
    pub artifact_path: Option<PathBuf>,
    pub metrics: Option<TrainingMetrics>,
    /// Failure or forced-termination message.
    pub error: Option<String>,
}

impl Job {
    #[must_use]
    pub fn new(id: JobId, submission: &JobSubmission) -> Self {
        Self {
            id,
            trainer_type: submission.trainer_type,
            config_ref: submission.config_ref.clone(),
            dataset_path: submission.dataset_path.clone(),
            priority: submission.priority,
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            artifact_path: None,
            metrics: None,
            error: None,
        }
    }
}
