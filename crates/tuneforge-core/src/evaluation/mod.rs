//! Golden datasets and judge-based evaluation.

mod evaluator;
mod golden;
mod judge;
mod result;
mod rubric;

pub use evaluator::{
    DEFAULT_EVALUATION_CONCURRENCY, DEFAULT_PASS_THRESHOLD, EvaluatorSettings, JudgeEvaluator,
};
pub use golden::{
    Difficulty, GoldenDataset, GoldenDatasets, GoldenSample, load_golden_samples, validate_samples,
};
pub use judge::{HttpInference, HttpJudge, Inference, Judge, JudgeRequest};
pub use result::{CriterionScore, EvaluationResult, SampleEvaluation};
pub use rubric::{Criterion, Rubric};
