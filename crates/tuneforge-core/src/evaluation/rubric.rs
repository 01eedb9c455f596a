//! Weighted scoring criteria.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const WEIGHT_TOLERANCE: f64 = 1e-6;

const DEFAULT_CRITERIA: [&str; 5] = ["correctness", "completeness", "relevance", "coherence", "safety"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub weight: f64,
}

impl Criterion {
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self { name: name.into(), weight }
    }
}

/// The criteria a judge scores every sample on. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rubric {
    criteria: Vec<Criterion>,
}

impl Default for Rubric {
    fn default() -> Self {
        let weight = 1.0 / DEFAULT_CRITERIA.len() as f64;
        Self { criteria: DEFAULT_CRITERIA.iter().map(|name| Criterion::new(*name, weight)).collect() }
    }
}

impl Rubric {
    pub fn new(criteria: Vec<Criterion>) -> Result<Self> {
        let rubric = Self { criteria };
        rubric.validate()?;
        Ok(rubric)
    }

    #[must_use]
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.criteria.iter().map(|c| c.name.clone()).collect()
    }

    /// Non-empty, unique non-blank names, positive finite weights summing to 1.0.
    pub fn validate(&self) -> Result<()> {
        if self.criteria.is_empty() {
            return Err(ForgeError::ValidationFailure("rubric has no criteria".to_string()));
        }

        let mut seen = HashSet::new();
        for criterion in &self.criteria {
            if criterion.name.trim().is_empty() {
                return Err(ForgeError::ValidationFailure("rubric criterion name is empty".to_string()));
            }
            if !seen.insert(criterion.name.as_str()) {
                return Err(ForgeError::ValidationFailure(format!(
                    "duplicate rubric criterion {}",
                    criterion.name
                )));
            }
            if !criterion.weight.is_finite() || criterion.weight <= 0.0 {
                return Err(ForgeError::ValidationFailure(format!(
                    "criterion {} has non-positive weight {}",
                    criterion.name, criterion.weight
                )));
            }
        }

        let total: f64 = self.criteria.iter().map(|c| c.weight).sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ForgeError::ValidationFailure(format!(
                "rubric weights sum to {total}, expected 1.0"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rubric() {
        let rubric = Rubric::default();
        assert_eq!(rubric.criteria().len(), 5);
        assert!(rubric.validate().is_ok());
        assert!(rubric.criteria().iter().all(|c| (c.weight - 0.2).abs() < 1e-12));
        assert_eq!(rubric.names()[4], "safety");
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = Rubric::new(vec![Criterion::new("a", 0.5), Criterion::new("b", 0.4)]).unwrap_err();
        assert!(err.to_string().contains("sum"));
        assert!(Rubric::new(vec![Criterion::new("a", 0.7), Criterion::new("b", 0.3)]).is_ok());
    }

    #[test]
    fn test_rejects_duplicates_and_non_positive() {
        assert!(Rubric::new(vec![Criterion::new("a", 0.5), Criterion::new("a", 0.5)]).is_err());
        assert!(Rubric::new(vec![Criterion::new("a", 1.2), Criterion::new("b", -0.2)]).is_err());
        assert!(Rubric::new(vec![]).is_err());
    }

    #[test]
    fn test_deserializes_from_list() {
        let rubric: Rubric =
            serde_json::from_str(r#"[{"name": "accuracy", "weight": 0.6}, {"name": "tone", "weight": 0.4}]"#)
                .unwrap();
        assert!(rubric.validate().is_ok());
        assert_eq!(rubric.names(), vec!["accuracy", "tone"]);
    }
}
