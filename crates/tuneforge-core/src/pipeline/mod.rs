//! End-to-end adapter lifecycle: retrieve, train, register, evaluate,
//! approve.
//!
//! Each step runs only when the previous one succeeded. A failure halts the
//! run and is attributed to its step; nothing after it happens, so a failed
//! job never registers and a failed evaluation never approves.

use crate::error::ForgeError;
use crate::evaluation::{EvaluationResult, GoldenDatasets, Inference, JudgeEvaluator};
use crate::registry::{
    AdapterRegistry, AdapterVersion, Approval, BumpKind, Hyperparams, RegisterRequest,
};
use crate::retrieval::{CorpusSummary, RetrievalQuery, StreamingRetriever};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tuneforge_orchestrator::{Job, JobManager, JobState};
use tuneforge_training::{ForgeLayout, JobSubmission, TrainerType};

const PIPELINE_ACTOR: &str = "lifecycle-pipeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Retrieve,
    Train,
    Register,
    Evaluate,
    Approve,
}

impl PipelineStep {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::Train => "train",
            Self::Register => "register",
            Self::Evaluate => "evaluate",
            Self::Approve => "approve",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run halted at `step`.
#[derive(Debug, Error)]
#[error("{step} step failed: {source}")]
pub struct PipelineError {
    pub step: PipelineStep,
    #[source]
    pub source: ForgeError,
}

impl PipelineError {
    fn at(step: PipelineStep) -> impl FnOnce(ForgeError) -> Self {
        move |source| Self { step, source }
    }
}

/// What happened to the new version at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    /// Below threshold, left for a human.
    Pending,
    /// Below threshold with auto-reject on.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRequest {
    pub domain: String,
    /// Adapter family to register into; defaults to `domain`.
    #[serde(default)]
    pub family: Option<String>,
    pub query: RetrievalQuery,
    pub golden_dataset_id: String,
    /// Aggregate score (0-100) at or above which the version is approved.
    pub approval_threshold: f64,
    pub trainer_type: TrainerType,
    pub config_ref: String,
    pub base_model: String,
    pub method: String,
    #[serde(default)]
    pub hyperparams: Hyperparams,
    #[serde(default)]
    pub bump: BumpKind,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    5
}

impl LifecycleRequest {
    #[must_use]
    pub fn family(&self) -> &str {
        self.family.as_deref().unwrap_or(&self.domain)
    }

    fn validate(&self) -> Result<(), ForgeError> {
        if self.domain.trim().is_empty() {
            return Err(ForgeError::ValidationFailure("domain is required".to_string()));
        }
        if !(0.0..=100.0).contains(&self.approval_threshold) {
            return Err(ForgeError::ValidationFailure(format!(
                "approval_threshold {} outside 0-100",
                self.approval_threshold
            )));
        }
        self.query.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleResult {
    pub run_id: String,
    pub corpus: CorpusSummary,
    pub job: Job,
    /// The version as it stands after the approval step.
    pub version: AdapterVersion,
    pub evaluation: EvaluationResult,
    pub decision: ApprovalDecision,
}

/// Everything a pipeline drives.
#[derive(Clone)]
pub struct PipelineParts {
    pub retriever: StreamingRetriever,
    pub jobs: JobManager,
    pub registry: AdapterRegistry,
    pub golden: GoldenDatasets,
    pub evaluator: JudgeEvaluator,
    pub inference: Arc<dyn Inference>,
    pub layout: ForgeLayout,
}

#[derive(Clone)]
pub struct LifecyclePipeline {
    parts: PipelineParts,
    auto_reject: bool,
}

impl fmt::Debug for LifecyclePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecyclePipeline")
            .field("layout", &self.parts.layout)
            .field("auto_reject", &self.auto_reject)
            .finish_non_exhaustive()
    }
}

impl LifecyclePipeline {
    #[must_use]
    pub fn new(parts: PipelineParts) -> Self {
        Self { parts, auto_reject: false }
    }

    /// Reject below-threshold versions instead of leaving them pending.
    #[must_use]
    pub fn with_auto_reject(mut self, auto_reject: bool) -> Self {
        self.auto_reject = auto_reject;
        self
    }

    pub async fn run(&self, request: &LifecycleRequest) -> Result<LifecycleResult, PipelineError> {
        request.validate().map_err(PipelineError::at(PipelineStep::Retrieve))?;
        // Checked up front so a bad dataset id does not cost a training run.
        self.parts.golden.get(&request.golden_dataset_id).map_err(PipelineError::at(PipelineStep::Evaluate))?;

        let run_id = uuid::Uuid::new_v4().to_string();
        info!(run_id = %run_id, domain = %request.domain, family = %request.family(), "Lifecycle run started");

        let corpus = self.retrieve(&run_id, request).await.map_err(PipelineError::at(PipelineStep::Retrieve))?;
        let job = self.train(&corpus, request).await.map_err(PipelineError::at(PipelineStep::Train))?;
        let version = self.register(&job, request).map_err(PipelineError::at(PipelineStep::Register))?;
        let evaluation = self
            .evaluate(&version, &request.golden_dataset_id)
            .await
            .map_err(PipelineError::at(PipelineStep::Evaluate))?;
        let (version, decision) = self
            .decide(version, &evaluation, request.approval_threshold)
            .map_err(PipelineError::at(PipelineStep::Approve))?;

        info!(
            run_id = %run_id,
            version = %version.label(),
            aggregate = evaluation.aggregate_score,
            decision = ?decision,
            "Lifecycle run finished"
        );
        Ok(LifecycleResult { run_id, corpus, job, version, evaluation, decision })
    }

    async fn retrieve(&self, run_id: &str, request: &LifecycleRequest) -> Result<CorpusSummary, ForgeError> {
        let path = self.parts.layout.corpus_path(run_id);
        let corpus = self.parts.retriever.write_corpus(&request.query, &path).await?;
        if corpus.records == 0 {
            return Err(ForgeError::ValidationFailure(format!(
                "query {:?} produced no records above quality {}",
                request.query.query_text, request.query.min_quality_score
            )));
        }
        Ok(corpus)
    }

    async fn train(&self, corpus: &CorpusSummary, request: &LifecycleRequest) -> Result<Job, ForgeError> {
        let submission = JobSubmission::new(request.trainer_type, request.config_ref.clone())
            .with_dataset(corpus.path.clone())
            .with_priority(request.priority);
        let job_id = self.parts.jobs.submit(submission)?;
        info!(job_id = %job_id, "Waiting for training job");

        let job = self.parts.jobs.wait(&job_id).await?;
        match job.state {
            JobState::Completed if job.artifact_path.is_some() => Ok(job),
            JobState::Completed => {
                Err(ForgeError::InvalidState(format!("job {} completed without an artifact", job.id)))
            }
            JobState::Failed => Err(ForgeError::transport(
                "trainer",
                job.error.as_deref().unwrap_or("training failed"),
            )),
            state => Err(ForgeError::InvalidState(format!("job {} ended {state}", job.id))),
        }
    }

    fn register(&self, job: &Job, request: &LifecycleRequest) -> Result<AdapterVersion, ForgeError> {
        let artifact_path = job
            .artifact_path
            .clone()
            .ok_or_else(|| ForgeError::InvalidState(format!("job {} has no artifact", job.id)))?;
        self.parts.registry.register(RegisterRequest {
            family: request.family().to_string(),
            domain: request.domain.clone(),
            method: request.method.clone(),
            artifact_path,
            base_model: request.base_model.clone(),
            hyperparams: request.hyperparams.clone(),
            bump: request.bump,
            job_id: Some(job.id.to_string()),
        })
    }

    async fn evaluate(&self, version: &AdapterVersion, golden_dataset_id: &str) -> Result<EvaluationResult, ForgeError> {
        let evaluation =
            self.parts.evaluator.evaluate(&version.id, golden_dataset_id, self.parts.inference.as_ref()).await?;
        if evaluation.all_failed() {
            let first = evaluation.samples.iter().find_map(|s| s.error.clone()).unwrap_or_default();
            return Err(ForgeError::transport(
                "evaluation",
                format!("all {} samples failed; first error: {first}", evaluation.samples.len()),
            ));
        }
        Ok(evaluation)
    }

    fn decide(
        &self,
        version: AdapterVersion,
        evaluation: &EvaluationResult,
        threshold: f64,
    ) -> Result<(AdapterVersion, ApprovalDecision), ForgeError> {
        if evaluation.meets(threshold) {
            let approved = self.parts.registry.approve(
                &version.id,
                Approval::Evaluation {
                    actor: PIPELINE_ACTOR.to_string(),
                    evaluation_id: evaluation.id.clone(),
                    threshold,
                },
            )?;
            return Ok((approved, ApprovalDecision::Approved));
        }

        warn!(
            version = %version.label(),
            aggregate = evaluation.aggregate_score,
            threshold,
            "Aggregate score below approval threshold"
        );
        if self.auto_reject {
            let reason = format!(
                "evaluation {} scored {:.2}, below threshold {:.2}",
                evaluation.id, evaluation.aggregate_score, threshold
            );
            let rejected = self.parts.registry.reject(&version.id, PIPELINE_ACTOR, &reason)?;
            return Ok((rejected, ApprovalDecision::Rejected));
        }
        Ok((version, ApprovalDecision::Pending))
    }
}
