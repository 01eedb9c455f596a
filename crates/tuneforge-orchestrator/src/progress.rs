//! Job notifications.
//!
//! Every state transition is broadcast so that other components (the registry
//! hand-off, CLI progress output) can react without polling.

use crate::lifecycle::JobState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::debug;
use tuneforge_training::JobId;

/// Job event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job was accepted and queued.
    Submitted {
        /// Job ID.
        job_id: JobId,
        /// Job priority.
        priority: u8,
    },
    /// A job took a worker slot.
    Started {
        /// Job ID.
        job_id: JobId,
    },
    /// A job produced an artifact.
    Completed {
        /// Job ID.
        job_id: JobId,
        /// Produced artifact.
        artifact_path: PathBuf,
    },
    /// A job failed.
    Failed {
        /// Job ID.
        job_id: JobId,
        /// Error message.
        error: String,
    },
    /// A job was cancelled.
    Cancelled {
        /// Job ID.
        job_id: JobId,
        /// Whether the grace period expired and the worker was aborted.
        forced: bool,
    },
}

impl JobEvent {
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Submitted { job_id, .. }
            | Self::Started { job_id }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id, .. } => job_id,
        }
    }
}

/// Counts by state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl JobMetrics {
    pub(crate) fn record(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Running => self.running += 1,
            JobState::Completed => self.completed += 1,
            JobState::Failed => self.failed += 1,
            JobState::Cancelled => self.cancelled += 1,
        }
    }
}

/// Broadcast channel for job events.
#[derive(Debug, Clone)]
pub struct JobEventBus {
    broadcast_tx: broadcast::Sender<JobEvent>,
}

impl JobEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        Self { broadcast_tx }
    }

    /// Subscribes to job events.
    ///
    /// # Returns
    /// Returns a receiver for events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn emit(&self, event: JobEvent) {
        debug!(job_id = %event.job_id(), event = ?event, "Job event");
        // No subscribers is fine.
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
