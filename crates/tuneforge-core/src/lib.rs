//! Tuneforge Core - adapter lifecycle orchestration.
//!
//! This crate provides:
//! - Streaming retrieval of training corpora from a search collaborator
//! - An adapter registry with semantic versions, checksums, and approvals
//! - Golden datasets and judge-based evaluation
//! - The lifecycle pipeline tying retrieval, training, registration,
//!   evaluation, and approval together
//! - Configuration, error handling, and SQLite storage
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tuneforge_core::config::ForgeConfig;
//! use tuneforge_core::registry::AdapterRegistry;
//! use tuneforge_core::storage::Database;
//!
//! fn main() -> tuneforge_core::Result<()> {
//!     let config = ForgeConfig::discover_and_load()?;
//!     let db = Database::open(&config.layout().database_path())?.into_shared();
//!     let registry = AdapterRegistry::new(db);
//!     for family in registry.list_families()? {
//!         println!("{}", family.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod evaluation;
mod http;
pub mod pipeline;
pub mod registry;
pub mod retrieval;
pub mod storage;
pub mod training;

pub use config::ForgeConfig;
pub use error::{ForgeError, Result};
pub use evaluation::{
    EvaluationResult, GoldenDataset, GoldenDatasets, GoldenSample, HttpInference, HttpJudge,
    Inference, Judge, JudgeEvaluator, JudgeRequest, Rubric,
};
pub use pipeline::{
    ApprovalDecision, LifecyclePipeline, LifecycleRequest, LifecycleResult, PipelineError,
    PipelineParts, PipelineStep,
};
pub use registry::{
    AdapterFamily, AdapterRegistry, AdapterVersion, Approval, ApprovalStatus, BumpKind,
    Hyperparams, RegisterRequest, VersionDiff,
};
pub use retrieval::{
    HttpSearchSource, JsonlSearchSource, QualityScorer, RetrievalQuery, SearchSource,
    StreamingRetriever,
};
pub use storage::{Database, SharedDatabase, StorageError};
pub use training::CommandTrainer;
