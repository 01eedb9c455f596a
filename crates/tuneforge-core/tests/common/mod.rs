//! Shared test collaborators for Tuneforge Core integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tuneforge_core::retrieval::{RawDocument, SearchRequest, SearchSource};
use tuneforge_core::{AdapterVersion, ForgeError, Inference, Judge, JudgeRequest, Result};
use tuneforge_training::{
    ProgressSink, Trainer, TrainingError, TrainingJob, TrainingOutcome, TrainingResult,
};

/// A document that scores ~0.97 with the default scorer.
pub fn good_doc(id: usize) -> RawDocument {
    let mut doc = RawDocument::new(format!("doc-{id}"), "clause ".repeat(50), "contracts");
    doc.score = 0.9;
    doc.metadata.insert("domain".to_string(), json!("legal"));
    doc.metadata.insert("title".to_string(), json!(format!("Contract {id}")));
    doc.metadata.insert("created_at".to_string(), json!("2024-03-01T10:00:00Z"));
    doc
}

/// A document that scores ~0.04 with the default scorer.
pub fn poor_doc(id: usize) -> RawDocument {
    let mut doc = RawDocument::new(format!("doc-{id}"), "short", "scraped");
    doc.score = 0.1;
    doc
}

/// In-memory ranked result list that records every request.
pub struct VecSearchSource {
    docs: Vec<RawDocument>,
    fail_at_offset: Option<usize>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl VecSearchSource {
    pub fn new(docs: Vec<RawDocument>) -> Self {
        Self { docs, fail_at_offset: None, requests: Mutex::new(Vec::new()) }
    }

    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchSource for VecSearchSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawDocument>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_at_offset == Some(request.offset) {
            return Err(ForgeError::transport("search", "connection reset"));
        }
        Ok(self.docs.iter().skip(request.offset).take(request.limit).cloned().collect())
    }
}

/// Writes a small artifact file per job, or fails every job.
pub struct FileTrainer {
    pub dir: PathBuf,
    pub fail: bool,
}

#[async_trait]
impl Trainer for FileTrainer {
    fn id(&self) -> &'static str {
        "file"
    }

    async fn train(
        &self,
        job: &TrainingJob,
        _cancel: CancellationToken,
        _progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingOutcome> {
        if self.fail {
            return Err(TrainingError::Trainer("CUDA out of memory".to_string()));
        }
        let dataset = job
            .dataset_path
            .as_ref()
            .ok_or_else(|| TrainingError::InvalidSpec("no dataset".to_string()))?;
        let lines = std::fs::read_to_string(dataset)?.lines().count();
        let path = self.dir.join(format!("{}.bin", job.job_id));
        std::fs::write(&path, format!("weights trained on {lines} records"))?;
        Ok(TrainingOutcome { artifact_path: path, metrics: Default::default() })
    }
}

/// Echoes the prompt back, counting calls.
#[derive(Default)]
pub struct EchoInference {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Inference for EchoInference {
    async fn generate(&self, adapter: &AdapterVersion, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("[{}] {prompt}", adapter.label()))
    }
}

/// Fails for prompts containing `fail`.
pub struct SelectiveInference;

#[async_trait]
impl Inference for SelectiveInference {
    async fn generate(&self, _adapter: &AdapterVersion, prompt: &str) -> Result<String> {
        if prompt.contains("fail") {
            Err(ForgeError::transport("inference", "model server unavailable"))
        } else {
            Ok(format!("answer to {prompt}"))
        }
    }
}

pub struct DownInference;

#[async_trait]
impl Inference for DownInference {
    async fn generate(&self, _adapter: &AdapterVersion, _prompt: &str) -> Result<String> {
        Err(ForgeError::transport("inference", "connection refused"))
    }
}

/// Overwrites the adapter artifact before answering.
pub struct TamperingInference;

#[async_trait]
impl Inference for TamperingInference {
    async fn generate(&self, adapter: &AdapterVersion, prompt: &str) -> Result<String> {
        std::fs::write(&adapter.artifact_path, "tampered")?;
        Ok(prompt.to_string())
    }
}

/// Gives every requested criterion the same score.
pub struct FixedJudge(pub f64);

#[async_trait]
impl Judge for FixedJudge {
    async fn score(&self, request: &JudgeRequest) -> Result<BTreeMap<String, f64>> {
        Ok(request.criteria.iter().map(|c| (c.clone(), self.0)).collect())
    }
}

/// Scores from a table keyed by criterion name, regardless of request.
pub struct TableJudge(pub BTreeMap<String, f64>);

#[async_trait]
impl Judge for TableJudge {
    async fn score(&self, _request: &JudgeRequest) -> Result<BTreeMap<String, f64>> {
        Ok(self.0.clone())
    }
}

/// Scores by prompt: the number after `score=` in the prompt, for every criterion.
pub struct PromptJudge;

#[async_trait]
impl Judge for PromptJudge {
    async fn score(&self, request: &JudgeRequest) -> Result<BTreeMap<String, f64>> {
        let score = request
            .prompt
            .split("score=")
            .nth(1)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ForgeError::transport("judge", "unparseable prompt"))?;
        Ok(request.criteria.iter().map(|c| (c.clone(), score)).collect())
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
