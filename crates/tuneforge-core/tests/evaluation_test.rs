//! Integration tests for golden datasets and the judge evaluator.

mod common;

use common::{DownInference, EchoInference, FixedJudge, PromptJudge, SelectiveInference, TableJudge};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::TempDir;
use tuneforge_core::evaluation::{
    Criterion, EvaluatorSettings, GoldenDatasets, GoldenSample, Judge, JudgeEvaluator, Rubric,
};
use tuneforge_core::registry::{AdapterRegistry, AdapterVersion, BumpKind, RegisterRequest};
use tuneforge_core::storage::{Database, SharedDatabase};
use tuneforge_core::ForgeError;

struct Harness {
    _temp: TempDir,
    db: SharedDatabase,
    version: AdapterVersion,
    golden: GoldenDatasets,
}

fn harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let db = Database::open_in_memory().unwrap().into_shared();
    let artifact = temp.path().join("adapter.bin");
    std::fs::write(&artifact, "weights").unwrap();
    let version = AdapterRegistry::new(db.clone())
        .register(RegisterRequest {
            family: "qa".to_string(),
            domain: "qa".to_string(),
            method: "lora".to_string(),
            artifact_path: artifact,
            base_model: "llama-3-8b".to_string(),
            hyperparams: Default::default(),
            bump: BumpKind::Patch,
            job_id: None,
        })
        .unwrap();
    let golden = GoldenDatasets::new(db.clone());
    Harness { _temp: temp, db, version, golden }
}

fn evaluator(h: &Harness, judge: impl Judge + 'static, settings: EvaluatorSettings) -> JudgeEvaluator {
    JudgeEvaluator::new(h.db.clone(), Arc::new(judge), settings).unwrap()
}

fn samples(prompts: &[&str]) -> Vec<GoldenSample> {
    prompts.iter().map(|p| GoldenSample::new(*p, "expected")).collect()
}

#[tokio::test]
async fn test_weighted_aggregate_and_pass_rate() {
    let h = harness();
    let dataset = h.golden.create_golden_dataset("mixed", samples(&["score=90", "score=60", "score=80"])).unwrap();
    let eval = evaluator(&h, PromptJudge, EvaluatorSettings::default());

    let result = eval.evaluate(&h.version.id, &dataset.id, &EchoInference::default()).await.unwrap();

    let aggregates: Vec<f64> = result.samples.iter().map(|s| s.aggregate).collect();
    assert!((aggregates[0] - 90.0).abs() < 1e-9);
    assert!((aggregates[1] - 60.0).abs() < 1e-9);
    assert!((result.aggregate_score - 230.0 / 3.0).abs() < 1e-9);
    assert!((result.pass_rate - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(result.failed_samples, 0);
    assert_eq!(result.samples[0].criterion_scores.len(), 5);
}

#[tokio::test]
async fn test_custom_rubric_weights() {
    let h = harness();
    let dataset = h.golden.create_golden_dataset("one", samples(&["p"])).unwrap();
    let rubric = Rubric::new(vec![Criterion::new("accuracy", 0.75), Criterion::new("tone", 0.25)]).unwrap();
    let judge = TableJudge(BTreeMap::from([
        ("accuracy".to_string(), 80.0),
        ("tone".to_string(), 40.0),
        ("unused".to_string(), 0.0),
    ]));
    let eval = evaluator(&h, judge, EvaluatorSettings { rubric, ..Default::default() });

    let result = eval.evaluate(&h.version.id, &dataset.id, &EchoInference::default()).await.unwrap();
    assert!((result.aggregate_score - 70.0).abs() < 1e-9);
    assert!(result.samples[0].passed);
}

#[tokio::test]
async fn test_scores_are_clamped() {
    let h = harness();
    let dataset = h.golden.create_golden_dataset("one", samples(&["score=140"])).unwrap();
    let eval = evaluator(&h, PromptJudge, EvaluatorSettings::default());

    let result = eval.evaluate(&h.version.id, &dataset.id, &EchoInference::default()).await.unwrap();
    assert!((result.aggregate_score - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_sample_failures_are_recorded_inline() {
    let h = harness();
    let dataset = h
        .golden
        .create_golden_dataset("partial", samples(&["fine one", "please fail", "fine two", "fail again"]))
        .unwrap();
    let eval = evaluator(&h, FixedJudge(80.0), EvaluatorSettings::default());

    let result = eval.evaluate(&h.version.id, &dataset.id, &SelectiveInference).await.unwrap();

    assert_eq!(result.samples.len(), 4);
    assert_eq!(result.failed_samples, 2);
    assert!(!result.all_failed());
    let failed = &result.samples[1];
    assert_eq!(failed.aggregate, 0.0);
    assert!(!failed.passed);
    assert!(failed.error.as_deref().unwrap().contains("inference failed"));
    assert!((result.aggregate_score - 40.0).abs() < 1e-9);
    assert!((result.pass_rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_missing_criterion_fails_the_sample() {
    let h = harness();
    let dataset = h.golden.create_golden_dataset("one", samples(&["p"])).unwrap();
    let judge = TableJudge(BTreeMap::from([("correctness".to_string(), 90.0)]));
    let eval = evaluator(&h, judge, EvaluatorSettings::default());

    let result = eval.evaluate(&h.version.id, &dataset.id, &EchoInference::default()).await.unwrap();
    assert!(result.all_failed());
    assert!(result.samples[0].error.as_deref().unwrap().contains("completeness"));
    assert!(result.samples[0].output.is_some());
}

#[tokio::test]
async fn test_results_keep_dataset_order_under_concurrency() {
    let h = harness();
    let prompts: Vec<String> = (0..20).map(|i| format!("q{i} score={}", 50 + i)).collect();
    let refs: Vec<&str> = prompts.iter().map(String::as_str).collect();
    let dataset = h.golden.create_golden_dataset("ordered", samples(&refs)).unwrap();
    let eval = evaluator(&h, PromptJudge, EvaluatorSettings { concurrency: 6, ..Default::default() });
    let inference = EchoInference::default();

    let result = eval.evaluate(&h.version.id, &dataset.id, &inference).await.unwrap();

    assert_eq!(inference.calls.load(Ordering::SeqCst), 20);
    let ids: Vec<&str> = result.samples.iter().map(|s| s.sample_id.as_str()).collect();
    let expected: Vec<String> = (1..=20).map(|i| format!("sample-{i}")).collect();
    assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert!((result.samples[19].aggregate - 69.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_results_are_persisted() {
    let h = harness();
    let dataset = h.golden.create_golden_dataset("one", samples(&["p"])).unwrap();
    let eval = evaluator(&h, FixedJudge(75.0), EvaluatorSettings::default());

    let result = eval.evaluate(&h.version.id, &dataset.id, &EchoInference::default()).await.unwrap();
    let failed = eval.evaluate(&h.version.id, &dataset.id, &DownInference).await.unwrap();

    assert_eq!(eval.get_evaluation(&result.id).unwrap(), result);
    assert_eq!(eval.list_evaluations(&h.version.id).unwrap().len(), 2);
    assert!(failed.all_failed());
}

#[tokio::test]
async fn test_unknown_inputs_are_not_found() {
    let h = harness();
    let dataset = h.golden.create_golden_dataset("one", samples(&["p"])).unwrap();
    let eval = evaluator(&h, FixedJudge(75.0), EvaluatorSettings::default());

    let err = eval.evaluate("missing", &dataset.id, &EchoInference::default()).await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound(_)));
    let err = eval.evaluate(&h.version.id, "missing", &EchoInference::default()).await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound(_)));
}

#[test]
fn test_invalid_rubric_rejected_at_construction() {
    let h = harness();
    let settings = EvaluatorSettings {
        rubric: serde_json::from_str(r#"[{"name": "a", "weight": 0.9}]"#).unwrap(),
        ..Default::default()
    };
    assert!(JudgeEvaluator::new(h.db.clone(), Arc::new(FixedJudge(1.0)), settings).is_err());
}
