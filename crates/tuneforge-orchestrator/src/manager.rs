//! Job manager and worker pool.
//!
//! All job state lives in a single mutex-guarded table: the job map, the
//! pending queue, and the running-slot count. Dispatch happens inside that
//! critical section, both when a job is submitted and when a running job
//! reaches a terminal state, so slot accounting never races.

use crate::error::{JobError, Result};
use crate::job::Job;
use crate::lifecycle::JobState;
use crate::progress::{JobEvent, JobEventBus, JobMetrics};
use crate::queue::PendingQueue;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tuneforge_training::{
    JobId, JobSubmission, ProgressSink, Trainer, TracingProgressSink, TrainingJob,
    TrainingOutcome, TrainingResult,
};

/// Configuration for the job manager.
#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    /// Maximum number of jobs running at once.
    pub max_concurrent_jobs: usize,
    /// How long `cancel` waits for a running trainer to acknowledge before
    /// aborting its task.
    pub cancel_grace_period: Duration,
    /// Capacity of the job event broadcast channel.
    pub event_capacity: usize,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            cancel_grace_period: Duration::from_secs(30),
            event_capacity: 256,
        }
    }
}

struct JobEntry {
    job: Job,
    submission: JobSubmission,
    cancel: CancellationToken,
    cancel_requested: bool,
    handle: Option<JoinHandle<()>>,
    state_tx: watch::Sender<JobState>,
}

impl JobEntry {
    fn transition(&mut self, to: JobState) -> bool {
        let from = self.job.state;
        if !from.can_transition_to(to) {
            error!(job_id = %self.job.id, from = %from, to = %to, "Invalid job state transition");
            return false;
        }
        debug!(job_id = %self.job.id, from = %from, to = %to, "Job state transition");

        let now = chrono::Utc::now();
        self.job.state = to;
        if to == JobState::Running {
            self.job.started_at = Some(now);
        } else if to.is_terminal() {
            self.job.completed_at = Some(now);
        }
        self.state_tx.send_replace(to);
        true
    }
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<JobId, JobEntry>,
    order: Vec<JobId>,
    queue: PendingQueue,
    running: usize,
}

struct Inner {
    config: JobManagerConfig,
    trainer: Arc<dyn Trainer>,
    progress: Arc<dyn ProgressSink>,
    table: Mutex<JobTable>,
    events: JobEventBus,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves pending jobs into free slots. Caller holds the table lock.
    fn dispatch(self: &Arc<Self>, table: &mut JobTable) {
        while table.running < self.config.max_concurrent_jobs {
            let Some(job_id) = table.queue.pop() else {
                break;
            };
            let Some(entry) = table.jobs.get_mut(&job_id) else {
                continue;
            };
            if !entry.transition(JobState::Running) {
                continue;
            }
            table.running += 1;

            let training_job = TrainingJob::new(job_id.clone(), entry.job.created_at, &entry.submission);
            let cancel = entry.cancel.clone();
            let inner = Arc::clone(self);
            info!(
                job_id = %job_id,
                trainer = %self.trainer.id(),
                trainer_type = %training_job.trainer_type,
                running = table.running,
                "Dispatching job"
            );
            entry.handle = Some(tokio::spawn(async move {
                inner.run_job(training_job, cancel).await;
            }));
            self.events.emit(JobEvent::Started { job_id });
        }
    }

    async fn run_job(self: Arc<Self>, job: TrainingJob, cancel: CancellationToken) {
        let result = self.trainer.train(&job, cancel, self.progress.as_ref()).await;
        self.finish(&job.job_id, result);
    }

    fn finish(self: &Arc<Self>, job_id: &JobId, result: TrainingResult<TrainingOutcome>) {
        let mut guard = self.lock();
        let table = &mut *guard;
        let Some(entry) = table.jobs.get_mut(job_id) else {
            return;
        };
        if entry.job.state != JobState::Running {
            debug!(job_id = %job_id, state = %entry.job.state, "Ignoring trainer result for settled job");
            return;
        }

        let event = if entry.cancel_requested {
            entry.transition(JobState::Cancelled);
            info!(job_id = %job_id, "Job cancelled");
            JobEvent::Cancelled { job_id: job_id.clone(), forced: false }
        } else {
            match result {
                Ok(outcome) => {
                    entry.job.artifact_path = Some(outcome.artifact_path.clone());
                    entry.job.metrics = Some(outcome.metrics);
                    entry.transition(JobState::Completed);
                    info!(job_id = %job_id, artifact = %outcome.artifact_path.display(), "Job completed");
                    JobEvent::Completed { job_id: job_id.clone(), artifact_path: outcome.artifact_path }
                }
                Err(e) => {
                    let message = e.to_string();
                    entry.job.error = Some(message.clone());
                    entry.transition(JobState::Failed);
                    error!(job_id = %job_id, error = %message, "Job failed");
                    JobEvent::Failed { job_id: job_id.clone(), error: message }
                }
            }
        };
        entry.handle = None;
        table.running = table.running.saturating_sub(1);

        self.events.emit(event);
        self.dispatch(table);
    }

    /// Aborts a running job whose trainer ignored its cancellation token.
    fn force_cancel(self: &Arc<Self>, job_id: &JobId) {
        let mut guard = self.lock();
        let table = &mut *guard;
        let Some(entry) = table.jobs.get_mut(job_id) else {
            return;
        };
        if entry.job.state != JobState::Running {
            return;
        }

        if let Some(handle) = entry.handle.take() {
            handle.abort();
        }
        entry.job.error = Some(format!(
            "force-terminated after {:?} cancellation grace period",
            self.config.cancel_grace_period
        ));
        entry.transition(JobState::Cancelled);
        table.running = table.running.saturating_sub(1);
        warn!(job_id = %job_id, "Job force-terminated after grace period");

        self.events.emit(JobEvent::Cancelled { job_id: job_id.clone(), forced: true });
        self.dispatch(table);
    }
}

/// Bounded-concurrency job manager.
///
/// Cloning is cheap and yields a handle to the same manager. `submit` spawns
/// onto the ambient tokio runtime.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("config", &self.inner.config)
            .field("trainer", &self.inner.trainer.id())
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Creates a job manager that reports trainer progress through tracing.
    #[must_use]
    pub fn new(config: JobManagerConfig, trainer: Arc<dyn Trainer>) -> Self {
        Self::with_progress(config, trainer, Arc::new(TracingProgressSink))
    }

    #[must_use]
    pub fn with_progress(
        config: JobManagerConfig,
        trainer: Arc<dyn Trainer>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        if config.max_concurrent_jobs == 0 {
            warn!("max_concurrent_jobs is 0; submitted jobs will never run");
        }
        let events = JobEventBus::new(config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                trainer,
                progress,
                table: Mutex::new(JobTable::default()),
                events,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &JobManagerConfig {
        &self.inner.config
    }

    /// Enqueues a job and returns immediately.
    ///
    /// If a slot is free the job is already `running` when this returns.
    pub fn submit(&self, submission: JobSubmission) -> Result<JobId> {
        submission.validate()?;

        let job_id = JobId::new();
        let job = Job::new(job_id.clone(), &submission);
        let (state_tx, _) = watch::channel(JobState::Pending);
        let priority = submission.priority;

        let mut guard = self.inner.lock();
        let table = &mut *guard;
        table.jobs.insert(
            job_id.clone(),
            JobEntry {
                job,
                submission,
                cancel: CancellationToken::new(),
                cancel_requested: false,
                handle: None,
                state_tx,
            },
        );
        table.order.push(job_id.clone());
        table.queue.push(job_id.clone(), priority);
        info!(job_id = %job_id, priority, pending = table.queue.len(), "Job submitted");
        self.inner.events.emit(JobEvent::Submitted { job_id: job_id.clone(), priority });

        self.inner.dispatch(table);
        Ok(job_id)
    }

    pub fn get(&self, job_id: &JobId) -> Result<Job> {
        let table = self.inner.lock();
        table
            .jobs
            .get(job_id)
            .map(|e| e.job.clone())
            .ok_or_else(|| JobError::NotFound(job_id.clone()))
    }

    /// Lists jobs in submission order, optionally filtered by state.
    pub fn list(&self, state: Option<JobState>) -> Vec<Job> {
        let table = self.inner.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.jobs.get(id))
            .filter(|e| state.is_none_or(|s| e.job.state == s))
            .map(|e| e.job.clone())
            .collect()
    }

    /// Cancels a job.
    ///
    /// Pending jobs are cancelled immediately. Running jobs get their
    /// cancellation token triggered; this waits for the trainer to stop, and
    /// aborts the worker once the grace period expires.
    pub async fn cancel(&self, job_id: &JobId) -> Result<Job> {
        let mut state_rx = {
            let mut guard = self.inner.lock();
            let table = &mut *guard;
            let entry =
                table.jobs.get_mut(job_id).ok_or_else(|| JobError::NotFound(job_id.clone()))?;

            match entry.job.state {
                JobState::Pending => {
                    table.queue.remove(job_id);
                    entry.transition(JobState::Cancelled);
                    info!(job_id = %job_id, "Pending job cancelled");
                    let job = entry.job.clone();
                    self.inner.events.emit(JobEvent::Cancelled { job_id: job_id.clone(), forced: false });
                    return Ok(job);
                }
                JobState::Running => {
                    if !entry.cancel_requested {
                        entry.cancel_requested = true;
                        entry.cancel.cancel();
                        info!(job_id = %job_id, "Cancellation requested for running job");
                    }
                    entry.state_tx.subscribe()
                }
                state => return Err(JobError::InvalidState { job_id: job_id.clone(), state }),
            }
        };

        let grace = self.inner.config.cancel_grace_period;
        match tokio::time::timeout(grace, state_rx.wait_for(JobState::is_terminal)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Err(JobError::Closed),
            Err(_) => self.inner.force_cancel(job_id),
        }

        self.get(job_id)
    }

    /// Waits until the job reaches a terminal state.
    pub async fn wait(&self, job_id: &JobId) -> Result<Job> {
        let mut state_rx = {
            let table = self.inner.lock();
            table
                .jobs
                .get(job_id)
                .ok_or_else(|| JobError::NotFound(job_id.clone()))?
                .state_tx
                .subscribe()
        };
        state_rx.wait_for(JobState::is_terminal).await.map_err(|_| JobError::Closed)?;
        self.get(job_id)
    }

    /// Subscribes to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    pub fn metrics(&self) -> JobMetrics {
        let table = self.inner.lock();
        let mut metrics = JobMetrics::default();
        for entry in table.jobs.values() {
            metrics.record(entry.job.state);
        }
        metrics
    }

    /// Cancels every pending job and signals every running one.
    ///
    /// Does not wait for running trainers to stop.
    pub fn shutdown(&self) {
        let mut guard = self.inner.lock();
        let table = &mut *guard;
        while let Some(job_id) = table.queue.pop() {
            if let Some(entry) = table.jobs.get_mut(&job_id) {
                if entry.transition(JobState::Cancelled) {
                    self.inner.events.emit(JobEvent::Cancelled { job_id, forced: false });
                }
            }
        }
        for entry in table.jobs.values_mut() {
            if entry.job.state == JobState::Running && !entry.cancel_requested {
                entry.cancel_requested = true;
                entry.cancel.cancel();
            }
        }
        info!(running = table.running, "Job manager shutting down");
    }
}
