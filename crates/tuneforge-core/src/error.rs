//! Error types for Tuneforge Core.

use crate::storage::StorageError;
use thiserror::Error;
use tuneforge_orchestrator::JobError;
use tuneforge_training::TrainingError;

/// Core error type for lifecycle operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// An external collaborator (search, trainer, inference, judge) was
    /// unreachable or returned an error. Not retried here.
    #[error("Transport failure ({collaborator}): {message}")]
    TransportFailure {
        /// Which collaborator failed
        collaborator: String,
        /// Failure detail
        message: String,
    },

    /// Operation rejected because of the target's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed input, rejected before any side effect
    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    /// Stored and recomputed artifact checksums differ
    #[error("Checksum mismatch for adapter version {version_id}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        /// Adapter version id
        version_id: String,
        /// Checksum recorded at registration
        expected: String,
        /// Checksum of the artifact now
        actual: String,
    },

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Version already approved
    #[error("Adapter version {0} is already approved")]
    AlreadyApproved(String),

    /// Version already rejected
    #[error("Adapter version {0} is already rejected")]
    AlreadyRejected(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Job manager errors
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Training primitive errors (corpus, artifacts)
    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    pub fn transport(collaborator: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::TransportFailure { collaborator: collaborator.into(), message: message.to_string() }
    }

    /// Lifts a storage lookup failure, surfacing missing rows as `NotFound`.
    pub(crate) fn from_lookup(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other),
        }
    }

    /// Only transport failures are worth retrying, and that is up to the caller.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }
}

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
