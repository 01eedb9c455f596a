use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Judge score for one rubric criterion, 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub weight: f64,
    pub score: f64,
}

/// Scored output for one golden sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEvaluation {
    pub sample_id: String,
    pub output: Option<String>,
    pub criterion_scores: Vec<CriterionScore>,
    /// Weighted sum of criterion scores; zero when `error` is set.
    pub aggregate: f64,
    pub passed: bool,
    /// Inference or judging failure for this sample only.
    pub error: Option<String>,
}

impl SampleEvaluation {
    #[must_use]
    pub fn failed(sample_id: &str, output: Option<String>, error: String) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            output,
            criterion_scores: Vec::new(),
            aggregate: 0.0,
            passed: false,
            error: Some(error),
        }
    }
}

/// One scored run of an adapter version against a golden dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: String,
    pub adapter_version_id: String,
    pub golden_dataset_id: String,
    pub samples: Vec<SampleEvaluation>,
    /// Mean of per-sample aggregates, 0-100.
    pub aggregate_score: f64,
    /// Fraction of samples meeting the per-sample pass threshold.
    pub pass_rate: f64,
    /// Samples whose inference or judging failed.
    pub failed_samples: usize,
    pub created_at: DateTime<Utc>,
}

impl EvaluationResult {
    #[must_use]
    pub fn meets(&self, threshold: f64) -> bool {
        self.aggregate_score >= threshold
    }

    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.samples.is_empty() && self.failed_samples == self.samples.len()
    }
}
