//! Storage layer for Tuneforge Core.
//!
//! SQLite persistence using the Repository pattern: adapter families and
//! versions, golden datasets, and evaluation results.

// SQL strings don't need hash-less raw strings
#![allow(clippy::needless_raw_string_hashes)]

pub mod database;
pub mod error;
pub mod repositories;

pub use database::{Database, SharedDatabase};
pub use error::{StorageError, StorageResult};
pub use repositories::{
    AdapterRepository, EvaluationRepository, GoldenDatasetRepository, SqliteAdapterRepository,
    SqliteEvaluationRepository, SqliteGoldenDatasetRepository,
};
