use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

/// Free-form metadata attached to a record (domain, timestamps, title, ...).
pub type RecordMetadata = serde_json::Map<String, serde_json::Value>;

/// A single retrieved training example.
///
/// Records are produced by the retrieval stream and never mutated afterwards;
/// whoever persists them owns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Identifier assigned by the search collaborator.
    pub id: String,
    /// Raw document text.
    pub text: String,
    /// Where the document came from (collection, URL, file, ...).
    pub source: String,
    /// Computed quality in `[0, 1]`.
    pub quality_score: f64,
    /// Relevance reported by the search collaborator, clamped to `[0, 1]`.
    pub relevance_score: f64,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl TrainingRecord {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.id.trim().is_empty() {
            return Err(TrainingError::Corpus("record id is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(TrainingError::Corpus(format!(
                "record {} quality_score {} out of range",
                self.id, self.quality_score
            )));
        }
        if !(0.0..=1.0).contains(&self.relevance_score) {
            return Err(TrainingError::Corpus(format!(
                "record {} relevance_score {} out of range",
                self.id, self.relevance_score
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quality: f64) -> TrainingRecord {
        TrainingRecord {
            id: "doc-1".to_string(),
            text: "text".to_string(),
            source: "kb".to_string(),
            quality_score: quality,
            relevance_score: 0.5,
            metadata: RecordMetadata::new(),
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range_quality() {
        assert!(record(1.5).validate().is_err());
        assert!(record(0.9).validate().is_ok());
    }
}
