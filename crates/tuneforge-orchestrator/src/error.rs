// Error types for job management

use crate::lifecycle::JobState;
use thiserror::Error;
use tuneforge_training::{JobId, TrainingError};

/// Result type for job manager operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Job manager errors
#[derive(Debug, Error)]
pub enum JobError {
    /// No job with this id
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Operation not allowed in the job's current state
    #[error("Job {job_id} is {state}; operation not allowed")]
    InvalidState {
        /// Job id
        job_id: JobId,
        /// State at the time of the request
        state: JobState,
    },

    /// Submission rejected before any side effect
    #[error("Invalid job submission: {0}")]
    Validation(String),

    /// The manager was dropped while a caller was waiting
    #[error("Job manager closed")]
    Closed,
}

impl From<TrainingError> for JobError {
    fn from(err: TrainingError) -> Self {
        Self::Validation(err.to_string())
    }
}
