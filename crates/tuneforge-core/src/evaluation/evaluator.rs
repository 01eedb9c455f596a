//! Judge-based evaluation of adapter versions against golden datasets.

use super::golden::{GoldenDataset, GoldenSample};
use super::judge::{Inference, Judge, JudgeRequest};
use super::result::{CriterionScore, EvaluationResult, SampleEvaluation};
use super::rubric::Rubric;
use crate::error::{ForgeError, Result};
use crate::registry::AdapterVersion;
use crate::storage::{
    AdapterRepository, EvaluationRepository, GoldenDatasetRepository, SharedDatabase,
    SqliteAdapterRepository, SqliteEvaluationRepository, SqliteGoldenDatasetRepository,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_PASS_THRESHOLD: f64 = 70.0;
pub const DEFAULT_EVALUATION_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    pub rubric: Rubric,
    /// Per-sample aggregate a sample needs to count as passed.
    pub pass_threshold: f64,
    /// Samples in flight at once.
    pub concurrency: usize,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            rubric: Rubric::default(),
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            concurrency: DEFAULT_EVALUATION_CONCURRENCY,
        }
    }
}

/// Scores adapter versions with an inference collaborator and a judge.
#[derive(Clone)]
pub struct JudgeEvaluator {
    db: SharedDatabase,
    judge: Arc<dyn Judge>,
    settings: EvaluatorSettings,
}

impl JudgeEvaluator {
    pub fn new(db: SharedDatabase, judge: Arc<dyn Judge>, settings: EvaluatorSettings) -> Result<Self> {
        settings.rubric.validate()?;
        if !(0.0..=100.0).contains(&settings.pass_threshold) {
            return Err(ForgeError::ValidationFailure(format!(
                "pass threshold {} outside 0-100",
                settings.pass_threshold
            )));
        }
        Ok(Self { db, judge, settings })
    }

    #[must_use]
    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    /// Evaluates every sample of the dataset against the adapter version and
    /// stores the result.
    ///
    /// A collaborator failure on one sample scores that sample zero and is
    /// recorded on it; the evaluation itself still completes.
    pub async fn evaluate(
        &self,
        adapter_version_id: &str,
        golden_dataset_id: &str,
        inference: &dyn Inference,
    ) -> Result<EvaluationResult> {
        let (adapter, dataset) = self.load_inputs(adapter_version_id, golden_dataset_id)?;
        info!(
            version = %adapter.label(),
            dataset = %dataset.name,
            dataset_version = dataset.version,
            samples = dataset.samples.len(),
            "Starting evaluation"
        );

        let concurrency = self.settings.concurrency.max(1);
        let samples: Vec<SampleEvaluation> = stream::iter(dataset.samples.iter())
            .map(|sample| self.evaluate_sample(&adapter, sample, inference))
            .buffered(concurrency)
            .collect()
            .await;

        let total = samples.len() as f64;
        let aggregate_score = samples.iter().map(|s| s.aggregate).sum::<f64>() / total;
        let passed = samples.iter().filter(|s| s.passed).count();
        let failed_samples = samples.iter().filter(|s| s.error.is_some()).count();

        let result = EvaluationResult {
            id: uuid::Uuid::new_v4().to_string(),
            adapter_version_id: adapter.id.clone(),
            golden_dataset_id: dataset.id.clone(),
            samples,
            aggregate_score,
            pass_rate: passed as f64 / total,
            failed_samples,
            created_at: Utc::now(),
        };

        {
            let mut db = self.db.lock();
            SqliteEvaluationRepository::new(&mut db).create(&result)?;
        }

        if failed_samples > 0 {
            warn!(evaluation_id = %result.id, failed_samples, "Evaluation completed with failed samples");
        }
        info!(
            evaluation_id = %result.id,
            version = %adapter.label(),
            aggregate = result.aggregate_score,
            pass_rate = result.pass_rate,
            "Evaluation complete"
        );
        Ok(result)
    }

    pub fn get_evaluation(&self, evaluation_id: &str) -> Result<EvaluationResult> {
        let mut db = self.db.lock();
        SqliteEvaluationRepository::new(&mut db).get_by_id(evaluation_id).map_err(ForgeError::from_lookup)
    }

    /// Stored evaluations of a version, newest first.
    pub fn list_evaluations(&self, adapter_version_id: &str) -> Result<Vec<EvaluationResult>> {
        let mut db = self.db.lock();
        Ok(SqliteEvaluationRepository::new(&mut db).get_by_version(adapter_version_id)?)
    }

    fn load_inputs(&self, adapter_version_id: &str, golden_dataset_id: &str) -> Result<(AdapterVersion, GoldenDataset)> {
        let mut db = self.db.lock();
        let adapter = SqliteAdapterRepository::new(&mut db)
            .get_version(adapter_version_id)
            .map_err(ForgeError::from_lookup)?;
        let dataset = SqliteGoldenDatasetRepository::new(&mut db)
            .get_by_id(golden_dataset_id)
            .map_err(ForgeError::from_lookup)?;
        if dataset.samples.is_empty() {
            return Err(ForgeError::ValidationFailure(format!("golden dataset {} has no samples", dataset.id)));
        }
        Ok((adapter, dataset))
    }

    async fn evaluate_sample(
        &self,
        adapter: &AdapterVersion,
        sample: &GoldenSample,
        inference: &dyn Inference,
    ) -> SampleEvaluation {
        let output = match inference.generate(adapter, &sample.prompt).await {
            Ok(output) => output,
            Err(e) => {
                warn!(sample_id = %sample.id, error = %e, "Inference failed");
                return SampleEvaluation::failed(&sample.id, None, format!("inference failed: {e}"));
            }
        };

        let request = JudgeRequest {
            prompt: sample.prompt.clone(),
            output: output.clone(),
            expected_output: sample.expected_output.clone(),
            rubric: sample.rubric.clone(),
            criteria: self.settings.rubric.names(),
        };
        let scores = match self.judge.score(&request).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(sample_id = %sample.id, error = %e, "Judge failed");
                return SampleEvaluation::failed(&sample.id, Some(output), format!("judge failed: {e}"));
            }
        };

        let mut criterion_scores = Vec::with_capacity(self.settings.rubric.criteria().len());
        for criterion in self.settings.rubric.criteria() {
            let Some(score) = scores.get(&criterion.name).copied().filter(|s| s.is_finite()) else {
                warn!(sample_id = %sample.id, criterion = %criterion.name, "Judge returned no score");
                return SampleEvaluation::failed(
                    &sample.id,
                    Some(output),
                    format!("judge returned no score for {}", criterion.name),
                );
            };
            criterion_scores.push(CriterionScore {
                criterion: criterion.name.clone(),
                weight: criterion.weight,
                score: score.clamp(0.0, 100.0),
            });
        }

        let aggregate: f64 = criterion_scores.iter().map(|c| c.weight * c.score).sum();
        SampleEvaluation {
            sample_id: sample.id.clone(),
            output: Some(output),
            criterion_scores,
            aggregate,
            passed: aggregate >= self.settings.pass_threshold,
            error: None,
        }
    }
}

impl std::fmt::Debug for JudgeEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeEvaluator").field("settings", &self.settings).finish_non_exhaustive()
    }
}
