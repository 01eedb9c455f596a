use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use tuneforge_training::RecordMetadata;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// What to retrieve and how much of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub query_text: String,
    /// Maximum number of raw results requested from the source.
    pub top_k: usize,
    /// Records scoring below this are discarded.
    #[serde(default)]
    pub min_quality_score: f64,
    /// Structured filters passed through to the source.
    #[serde(default)]
    pub filters: RecordMetadata,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl RetrievalQuery {
    #[must_use]
    pub fn new(query_text: impl Into<String>, top_k: usize) -> Self {
        Self {
            query_text: query_text.into(),
            top_k,
            min_quality_score: 0.0,
            filters: RecordMetadata::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_min_quality(mut self, min_quality_score: f64) -> Self {
        self.min_quality_score = min_quality_score;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query_text.trim().is_empty() {
            return Err(ForgeError::ValidationFailure("query_text is empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ForgeError::ValidationFailure("batch_size must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_quality_score) {
            return Err(ForgeError::ValidationFailure(format!(
                "min_quality_score {} outside [0, 1]",
                self.min_quality_score
            )));
        }
        Ok(())
    }
}
