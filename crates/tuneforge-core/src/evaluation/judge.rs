//! Inference and judging collaborators.

use crate::error::Result;
use crate::http::{DEFAULT_TIMEOUT, build_client, post_json};
use crate::registry::AdapterVersion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Runs a prompt through a base model with an adapter applied.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn generate(&self, adapter: &AdapterVersion, prompt: &str) -> Result<String>;
}

/// What the judge sees for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub prompt: String,
    pub output: String,
    pub expected_output: Option<String>,
    pub rubric: Option<String>,
    /// Criterion names a score is required for.
    pub criteria: Vec<String>,
}

/// Scores an output 0-100 per criterion.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn score(&self, request: &JudgeRequest) -> Result<BTreeMap<String, f64>>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    adapter_id: &'a str,
    adapter: String,
    artifact_path: &'a PathBuf,
    base_model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    output: String,
}

/// Inference service reached over HTTP.
///
/// `POST {endpoint}` with `{adapter_id, adapter, artifact_path, base_model, prompt}`,
/// expecting `{"output": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpInference {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpInference {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), http: build_client(DEFAULT_TIMEOUT) }
    }
}

#[async_trait]
impl Inference for HttpInference {
    async fn generate(&self, adapter: &AdapterVersion, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            adapter_id: &adapter.id,
            adapter: adapter.label(),
            artifact_path: &adapter.artifact_path,
            base_model: &adapter.base_model,
            prompt,
        };
        let response: GenerateResponse = post_json(&self.http, &self.endpoint, "inference", &body).await?;
        Ok(response.output)
    }
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    scores: BTreeMap<String, f64>,
}

/// Judge service reached over HTTP.
///
/// `POST {endpoint}` with a [`JudgeRequest`], expecting
/// `{"scores": {"<criterion>": <0-100>, ...}}`.
#[derive(Debug, Clone)]
pub struct HttpJudge {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpJudge {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), http: build_client(DEFAULT_TIMEOUT) }
    }
}

#[async_trait]
impl Judge for HttpJudge {
    async fn score(&self, request: &JudgeRequest) -> Result<BTreeMap<String, f64>> {
        let response: ScoreResponse = post_json(&self.http, &self.endpoint, "judge", request).await?;
        Ok(response.scores)
    }
}
