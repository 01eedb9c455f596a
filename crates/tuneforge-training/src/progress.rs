use crate::job::JobId;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { job_id: JobId },
    Message { job_id: JobId, message: String },
    Step { job_id: JobId, step: u64, total: Option<u64> },
    Finished { job_id: JobId },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Forwards trainer progress into the tracing pipeline.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { job_id } => info!(job_id = %job_id, "training started"),
            ProgressEvent::Message { job_id, message } => info!(job_id = %job_id, "{message}"),
            ProgressEvent::Step { job_id, step, total } => {
                if let Some(total) = total {
                    info!(job_id = %job_id, step, total, "training step");
                } else {
                    info!(job_id = %job_id, step, "training step");
                }
            }
            ProgressEvent::Finished { job_id } => info!(job_id = %job_id, "training finished"),
        }
    }
}

#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}
