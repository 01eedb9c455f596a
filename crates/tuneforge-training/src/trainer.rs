use crate::error::TrainingResult;
use crate::job::TrainingJob;
use crate::progress::ProgressSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TrainingMetrics {
    pub train_loss: Option<f64>,
    pub eval_loss: Option<f64>,
    pub steps: Option<u64>,
}

/// Result of a successful training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingOutcome {
    /// File or directory holding the produced adapter.
    pub artifact_path: PathBuf,
    #[serde(default)]
    pub metrics: TrainingMetrics,
}

/// External training collaborator.
///
/// Implementations are expected to watch `cancel` and return
/// [`TrainingError::Cancelled`](crate::TrainingError::Cancelled) once they have
/// stopped. Trainers that ignore the token are force-terminated by the job
/// manager after its grace period.
#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    async fn train(
        &self,
        job: &TrainingJob,
        cancel: CancellationToken,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingOutcome>;
}
