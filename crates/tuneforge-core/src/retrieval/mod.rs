//! Streaming retrieval of training records from a search collaborator.
//!
//! Results are requested in bounded batches at increasing offsets, scored for
//! quality, filtered, and yielded as soon as their batch arrives.

mod quality;
mod query;
mod sources;
mod stream;

pub use quality::{QualityScorer, QualityWeights};
pub use query::{DEFAULT_BATCH_SIZE, RetrievalQuery};
pub use sources::{HttpSearchSource, JsonlSearchSource};
pub use stream::{CorpusSummary, RecordStream, RetrievalStats, StreamingRetriever};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tuneforge_training::RecordMetadata;

/// One page request to the search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_text: String,
    pub filters: RecordMetadata,
    pub offset: usize,
    pub limit: usize,
}

/// A search hit before quality scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub source: String,
    /// Relevance reported by the source.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl RawDocument {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
            score: 0.0,
            metadata: RecordMetadata::new(),
        }
    }
}

/// External search collaborator.
///
/// Must return results in a stable order for a given query so that offsets
/// are meaningful. Returning fewer than `limit` results signals the end.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawDocument>>;
}
