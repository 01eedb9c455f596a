//! Integration tests for the job manager.
//!
//! The test trainer's behaviour is selected by the job's `config_ref`:
//! - `ok`       returns an artifact immediately
//! - `fail`     returns an error
//! - `gated`    waits for a permit from the shared gate, honouring cancellation
//! - `stubborn` ignores cancellation and never finishes

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tuneforge_orchestrator::{JobError, JobEvent, JobManager, JobManagerConfig, JobState};
use tuneforge_training::{
    JobId, JobSubmission, ProgressSink, Trainer, TrainerType, TrainingError, TrainingJob,
    TrainingOutcome, TrainingResult,
};

struct ScriptedTrainer {
    gate: Arc<Semaphore>,
    started: Mutex<Vec<JobId>>,
}

impl ScriptedTrainer {
    fn new() -> Arc<Self> {
        Arc::new(Self { gate: Arc::new(Semaphore::new(0)), started: Mutex::new(Vec::new()) })
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    fn started(&self) -> Vec<JobId> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl Trainer for ScriptedTrainer {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn train(
        &self,
        job: &TrainingJob,
        cancel: CancellationToken,
        _progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingOutcome> {
        self.started.lock().unwrap().push(job.job_id.clone());
        let outcome = TrainingOutcome {
            artifact_path: PathBuf::from(format!("/artifacts/{}", job.job_id)),
            metrics: Default::default(),
        };
        match job.config_ref.as_str() {
            "ok" => Ok(outcome),
            "fail" => Err(TrainingError::Trainer("boom".to_string())),
            "gated" => {
                tokio::select! {
                    permit = self.gate.acquire() => {
                        permit.unwrap().forget();
                        Ok(outcome)
                    }
                    () = cancel.cancelled() => Err(TrainingError::Cancelled),
                }
            }
            "stubborn" => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(outcome)
            }
            other => Err(TrainingError::Trainer(format!("unknown script {other}"))),
        }
    }
}

fn manager(trainer: &Arc<ScriptedTrainer>, ceiling: usize) -> JobManager {
    let config = JobManagerConfig {
        max_concurrent_jobs: ceiling,
        cancel_grace_period: Duration::from_millis(100),
        event_capacity: 64,
    };
    JobManager::new(config, Arc::clone(trainer) as Arc<dyn Trainer>)
}

fn submission(script: &str) -> JobSubmission {
    JobSubmission::new(TrainerType::Lora, script)
}

async fn next_matching(
    rx: &mut tokio::sync::broadcast::Receiver<JobEvent>,
    pred: impl Fn(&JobEvent) -> bool,
) -> JobEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for job event")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn test_third_job_waits_for_free_slot() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 2);
    let mut events = manager.subscribe();

    let j1 = manager.submit(submission("gated")).unwrap();
    let j2 = manager.submit(submission("gated")).unwrap();
    let j3 = manager.submit(submission("gated")).unwrap();

    assert_eq!(manager.get(&j1).unwrap().state, JobState::Running);
    assert_eq!(manager.get(&j2).unwrap().state, JobState::Running);
    assert_eq!(manager.get(&j3).unwrap().state, JobState::Pending);

    trainer.release(1);
    let done = next_matching(&mut events, |e| matches!(e, JobEvent::Completed { .. })).await;
    assert!(done.job_id() == &j1 || done.job_id() == &j2);
    assert_eq!(manager.get(&j3).unwrap().state, JobState::Running);

    trainer.release(2);
    for id in [&j1, &j2, &j3] {
        let job = manager.wait(id).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
    }
    assert_eq!(manager.metrics().completed, 3);
}

#[tokio::test]
async fn test_higher_priority_dispatched_first_then_fifo() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 1);

    let first = manager.submit(submission("gated")).unwrap();
    let low = manager.submit(submission("gated").with_priority(3)).unwrap();
    let high_a = manager.submit(submission("gated").with_priority(8)).unwrap();
    let high_b = manager.submit(submission("gated").with_priority(8)).unwrap();

    for id in [&first, &high_a, &high_b, &low] {
        assert_eq!(manager.get(id).unwrap().state, JobState::Running);
        trainer.release(1);
        manager.wait(id).await.unwrap();
    }

    let job_ids: Vec<JobId> = vec![first, high_a, high_b, low];
    assert_eq!(trainer.started(), job_ids);
}

#[tokio::test]
async fn test_completed_job_carries_artifact() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 2);

    let id = manager.submit(submission("ok")).unwrap();
    let job = manager.wait(&id).await.unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.artifact_path, Some(PathBuf::from(format!("/artifacts/{id}"))));
    assert_eq!(job.error, None);
}

#[tokio::test]
async fn test_trainer_error_marks_job_failed() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 2);

    let id = manager.submit(submission("fail")).unwrap();
    let job = manager.wait(&id).await.unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.artifact_path, None);
    assert!(job.error.unwrap().contains("boom"));
}

#[tokio::test]
async fn test_cancel_terminal_job_is_invalid_state_and_leaves_record() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 2);

    let completed = manager.submit(submission("ok")).unwrap();
    let failed = manager.submit(submission("fail")).unwrap();
    manager.wait(&completed).await.unwrap();
    manager.wait(&failed).await.unwrap();

    for id in [&completed, &failed] {
        let before = manager.get(id).unwrap();
        let err = manager.cancel(id).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidState { .. }));
        assert_eq!(manager.get(id).unwrap(), before);
    }
}

#[tokio::test]
async fn test_cancel_pending_job_is_immediate_and_never_runs() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 1);

    let running = manager.submit(submission("gated")).unwrap();
    let queued = manager.submit(submission("gated")).unwrap();

    let job = manager.cancel(&queued).await.unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert!(job.started_at.is_none());

    trainer.release(1);
    manager.wait(&running).await.unwrap();
    assert_eq!(trainer.started(), vec![running]);
    assert_eq!(manager.get(&queued).unwrap().state, JobState::Cancelled);
}

#[tokio::test]
async fn test_cancel_running_job_cooperatively() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 1);
    let mut events = manager.subscribe();

    let id = manager.submit(submission("gated")).unwrap();
    let next = manager.submit(submission("ok")).unwrap();

    let job = manager.cancel(&id).await.unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert_eq!(job.error, None);

    let event = next_matching(&mut events, |e| matches!(e, JobEvent::Cancelled { .. })).await;
    assert_eq!(event, JobEvent::Cancelled { job_id: id, forced: false });

    // The freed slot goes to the next job.
    assert_eq!(manager.wait(&next).await.unwrap().state, JobState::Completed);
}

#[tokio::test]
async fn test_cancel_stubborn_job_forced_after_grace_period() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 1);

    let id = manager.submit(submission("stubborn")).unwrap();
    tokio::task::yield_now().await;

    let job = manager.cancel(&id).await.unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert!(job.error.unwrap().contains("force-terminated"));
    assert_eq!(manager.metrics().running, 0);
}

#[tokio::test]
async fn test_cancel_unknown_job_is_not_found() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 1);
    let err = manager.cancel(&JobId::from("nope")).await.unwrap_err();
    assert!(matches!(err, JobError::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_submission_has_no_side_effects() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 1);

    let err = manager.submit(submission("ok").with_priority(0)).unwrap_err();
    assert!(matches!(err, JobError::Validation(_)));
    assert!(manager.list(None).is_empty());
}

#[tokio::test]
async fn test_list_filters_by_state() {
    let trainer = ScriptedTrainer::new();
    let manager = manager(&trainer, 1);

    let running = manager.submit(submission("gated")).unwrap();
    let pending = manager.submit(submission("gated")).unwrap();

    let all: Vec<JobId> = manager.list(None).into_iter().map(|j| j.id).collect();
    assert_eq!(all, vec![running.clone(), pending.clone()]);

    let only_pending: Vec<JobId> =
        manager.list(Some(JobState::Pending)).into_iter().map(|j| j.id).collect();
    assert_eq!(only_pending, vec![pending]);

    manager.shutdown();
    assert_eq!(manager.wait(&running).await.unwrap().state, JobState::Cancelled);
    assert_eq!(manager.list(Some(JobState::Cancelled)).len(), 2);
}
