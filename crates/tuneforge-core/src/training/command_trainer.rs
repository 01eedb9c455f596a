//! Runs an external training command per job.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tuneforge_training::{
    ForgeLayout, ProgressEvent, ProgressSink, Trainer, TrainingError, TrainingJob, TrainingMetrics,
    TrainingOutcome, TrainingResult,
};

/// Trainer backed by an external program.
///
/// The program receives the job through arguments
/// (`--trainer-type`, `--config`, `--dataset`, `--output`) and the matching
/// `TUNEFORGE_*` environment variables. It must write the adapter into the
/// output directory and exit zero. Each stdout line is reported as progress.
/// The child is killed on cancellation and when the job task is aborted.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    program: String,
    args: Vec<String>,
    layout: ForgeLayout,
}

impl CommandTrainer {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, layout: ForgeLayout) -> Self {
        Self { program: program.into(), args, layout }
    }

    fn command(&self, job: &TrainingJob, output_dir: &Path) -> Command {
        let dataset = job.dataset_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--trainer-type")
            .arg(job.trainer_type.as_str())
            .arg("--config")
            .arg(&job.config_ref)
            .arg("--dataset")
            .arg(&dataset)
            .arg("--output")
            .arg(output_dir)
            .env("TUNEFORGE_JOB_ID", job.job_id.to_string())
            .env("TUNEFORGE_TRAINER_TYPE", job.trainer_type.as_str())
            .env("TUNEFORGE_CONFIG_REF", &job.config_ref)
            .env("TUNEFORGE_DATASET", &dataset)
            .env("TUNEFORGE_OUTPUT_DIR", output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

async fn next_line(lines: &mut Option<Lines<BufReader<ChildStdout>>>) -> Option<String> {
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

#[async_trait]
impl Trainer for CommandTrainer {
    fn id(&self) -> &'static str {
        "command"
    }

    async fn train(
        &self,
        job: &TrainingJob,
        cancel: CancellationToken,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingOutcome> {
        let output_dir = self.layout.job_output_dir(&job.job_id);
        tokio::fs::create_dir_all(&output_dir).await?;

        let mut child = self.command(job, &output_dir).spawn().map_err(|e| {
            TrainingError::Trainer(format!("failed to spawn {}: {e}", self.program))
        })?;
        debug!(job_id = %job.job_id, program = %self.program, "Spawned training command");
        progress.on_event(ProgressEvent::Started { job_id: job.job_id.clone() });

        let mut lines = child.stdout.take().map(|out| BufReader::new(out).lines());
        let mut steps = 0_u64;
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!(job_id = %job.job_id, error = %e, "Failed to kill training command");
                    }
                    return Err(TrainingError::Cancelled);
                }
                line = next_line(&mut lines) => match line {
                    Some(message) => {
                        steps += 1;
                        progress.on_event(ProgressEvent::Message { job_id: job.job_id.clone(), message });
                    }
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            () = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!(job_id = %job.job_id, error = %e, "Failed to kill training command");
                }
                return Err(TrainingError::Cancelled);
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            return Err(TrainingError::Trainer(format!("{} exited with {status}", self.program)));
        }

        let produced = std::fs::read_dir(&output_dir)?.next().is_some();
        if !produced {
            return Err(TrainingError::Artifact(format!(
                "{} left no artifact in {}",
                self.program,
                output_dir.display()
            )));
        }

        progress.on_event(ProgressEvent::Finished { job_id: job.job_id.clone() });
        Ok(TrainingOutcome {
            artifact_path: output_dir,
            metrics: TrainingMetrics { steps: Some(steps), ..Default::default() },
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tuneforge_training::{JobId, JobSubmission, NoopProgressSink, TrainerType};

    fn job() -> TrainingJob {
        let submission = JobSubmission::new(TrainerType::Lora, "presets/small.toml");
        TrainingJob::new(JobId::from("job-1"), chrono::Utc::now(), &submission)
    }

    fn shell(script: &str, temp: &TempDir) -> CommandTrainer {
        CommandTrainer::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            ForgeLayout::for_workspace_root(temp.path()),
        )
    }

    #[tokio::test]
    async fn test_successful_command_produces_artifact_dir() {
        let temp = TempDir::new().unwrap();
        let trainer = shell(
            "echo step-1; echo step-2; echo weights > \"$TUNEFORGE_OUTPUT_DIR/adapter.bin\"",
            &temp,
        );
        let outcome = trainer.train(&job(), CancellationToken::new(), &NoopProgressSink).await.unwrap();
        assert!(outcome.artifact_path.ends_with("artifacts/job-1"));
        assert!(outcome.artifact_path.join("adapter.bin").is_file());
        assert_eq!(outcome.metrics.steps, Some(2));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_trainer_error() {
        let temp = TempDir::new().unwrap();
        let err = shell("exit 3", &temp)
            .train(&job(), CancellationToken::new(), &NoopProgressSink)
            .await
            .unwrap_err();
        assert!(matches!(err, TrainingError::Trainer(_)));
    }

    #[tokio::test]
    async fn test_empty_output_is_artifact_error() {
        let temp = TempDir::new().unwrap();
        let err = shell("true", &temp)
            .train(&job(), CancellationToken::new(), &NoopProgressSink)
            .await
            .unwrap_err();
        assert!(matches!(err, TrainingError::Artifact(_)));
    }

    #[tokio::test]
    async fn test_cancel_kills_command() {
        let temp = TempDir::new().unwrap();
        let trainer = shell("sleep 30", &temp);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = trainer.train(&job(), cancel, &NoopProgressSink).await.unwrap_err();
        assert!(matches!(err, TrainingError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
