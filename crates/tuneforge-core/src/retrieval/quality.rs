//! Quality scoring for raw search results.

use super::RawDocument;
use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub content_length: f64,
    pub metadata_completeness: f64,
    pub source_relevance: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self { content_length: 0.4, metadata_completeness: 0.3, source_relevance: 0.3 }
    }
}

impl QualityWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.content_length, self.metadata_completeness, self.source_relevance];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ForgeError::ValidationFailure("quality weights must be non-negative".to_string()));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ForgeError::ValidationFailure(format!(
                "quality weights sum to {total}, expected 1.0"
            )));
        }
        Ok(())
    }
}

/// Scores documents in `[0, 1]`.
///
/// - content length: 1.0 inside `[min_length, max_length]` characters,
///   proportional below, `max_length / len` above
/// - metadata completeness: fraction of `expected_metadata` keys present and
///   non-null (1.0 when nothing is expected)
/// - source relevance: the source's own score, clamped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScorer {
    #[serde(default)]
    pub weights: QualityWeights,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_expected_metadata")]
    pub expected_metadata: Vec<String>,
}

fn default_min_length() -> usize {
    200
}

fn default_max_length() -> usize {
    8_000
}

fn default_expected_metadata() -> Vec<String> {
    vec!["domain".to_string(), "title".to_string(), "created_at".to_string()]
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            min_length: default_min_length(),
            max_length: default_max_length(),
            expected_metadata: default_expected_metadata(),
        }
    }
}

impl QualityScorer {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(ForgeError::ValidationFailure(format!(
                "length bounds [{}, {}] are invalid",
                self.min_length, self.max_length
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn score(&self, doc: &RawDocument) -> f64 {
        let score = self.weights.content_length * self.length_adequacy(&doc.text)
            + self.weights.metadata_completeness * self.metadata_completeness(doc)
            + self.weights.source_relevance * clamp_unit(doc.score);
        clamp_unit(score)
    }

    fn length_adequacy(&self, text: &str) -> f64 {
        let len = text.trim().chars().count();
        if len < self.min_length {
            len as f64 / self.min_length as f64
        } else if len > self.max_length {
            self.max_length as f64 / len as f64
        } else {
            1.0
        }
    }

    fn metadata_completeness(&self, doc: &RawDocument) -> f64 {
        if self.expected_metadata.is_empty() {
            return 1.0;
        }
        let present = self
            .expected_metadata
            .iter()
            .filter(|key| doc.metadata.get(key.as_str()).is_some_and(|v| !v.is_null()))
            .count();
        present as f64 / self.expected_metadata.len() as f64
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}
