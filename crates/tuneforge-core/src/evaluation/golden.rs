//! Golden datasets: fixed benchmark samples.

use crate::error::{ForgeError, Result};
use crate::storage::{GoldenDatasetRepository, SharedDatabase, SqliteGoldenDatasetRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenSample {
    /// Assigned as `sample-<n>` when left empty.
    #[serde(default)]
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub rubric: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl GoldenSample {
    #[must_use]
    pub fn new(prompt: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            prompt: prompt.into(),
            expected_output: Some(expected_output.into()),
            rubric: None,
            difficulty: Difficulty::default(),
        }
    }
}

/// A named, versioned benchmark. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenDataset {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub samples: Vec<GoldenSample>,
    pub created_at: DateTime<Utc>,
}

fn has_text(value: Option<&String>) -> bool {
    value.is_some_and(|s| !s.trim().is_empty())
}

/// Checks every sample has a prompt and either an expected output or a
/// rubric, and that sample ids are unique. Fills in missing ids.
pub fn validate_samples(name: &str, samples: &mut [GoldenSample]) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ForgeError::ValidationFailure("golden dataset name is empty".to_string()));
    }
    if samples.is_empty() {
        return Err(ForgeError::ValidationFailure(format!("golden dataset {name} has no samples")));
    }

    let mut seen = HashSet::new();
    for (idx, sample) in samples.iter_mut().enumerate() {
        if sample.id.trim().is_empty() {
            sample.id = format!("sample-{}", idx + 1);
        }
        if sample.prompt.trim().is_empty() {
            return Err(ForgeError::ValidationFailure(format!(
                "sample[{idx}] ({}) has an empty prompt",
                sample.id
            )));
        }
        if !has_text(sample.expected_output.as_ref()) && !has_text(sample.rubric.as_ref()) {
            return Err(ForgeError::ValidationFailure(format!(
                "sample[{idx}] ({}) needs an expected output or a rubric",
                sample.id
            )));
        }
        if !seen.insert(sample.id.clone()) {
            return Err(ForgeError::ValidationFailure(format!(
                "duplicate sample id {}",
                sample.id
            )));
        }
    }
    Ok(())
}

/// Reads golden samples from a JSONL file, one `GoldenSample` per line.
pub fn load_golden_samples(path: &Path) -> Result<Vec<GoldenSample>> {
    let contents = std::fs::read_to_string(path)?;
    let mut samples = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: GoldenSample = serde_json::from_str(line).map_err(|e| {
            ForgeError::ValidationFailure(format!("failed to parse golden sample line {}: {}", idx + 1, e))
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Golden dataset store.
#[derive(Debug, Clone)]
pub struct GoldenDatasets {
    db: SharedDatabase,
}

impl GoldenDatasets {
    #[must_use]
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Validates and stores a new dataset. Re-using a name creates the next
    /// version of that dataset.
    pub fn create_golden_dataset(
        &self,
        name: &str,
        mut samples: Vec<GoldenSample>,
    ) -> Result<GoldenDataset> {
        validate_samples(name, &mut samples)?;

        let mut db = self.db.lock();
        let mut repo = SqliteGoldenDatasetRepository::new(&mut db);
        let version = repo.latest_version(name)?.map_or(1, |v| v + 1);
        let dataset = GoldenDataset {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            version,
            samples,
            created_at: Utc::now(),
        };
        repo.create(&dataset)?;
        info!(
            dataset_id = %dataset.id,
            name = %dataset.name,
            version = dataset.version,
            samples = dataset.samples.len(),
            "Created golden dataset"
        );
        Ok(dataset)
    }

    pub fn get(&self, id: &str) -> Result<GoldenDataset> {
        let mut db = self.db.lock();
        let repo = SqliteGoldenDatasetRepository::new(&mut db);
        repo.get_by_id(id).map_err(ForgeError::from_lookup)
    }

    pub fn list(&self) -> Result<Vec<GoldenDataset>> {
        let mut db = self.db.lock();
        let repo = SqliteGoldenDatasetRepository::new(&mut db);
        Ok(repo.get_all()?)
    }
}
