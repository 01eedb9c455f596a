//! Tuneforge Training
//!
//! Backend-agnostic training primitives for:
//! - Representing training records and line-delimited corpora
//! - Describing training jobs (`JobSubmission`, `TrainingJob`)
//! - Checksumming produced adapter artifacts
//! - Implementing training backends (`Trainer`)

pub mod artifacts;
pub mod corpus;
pub mod error;
pub mod job;
pub mod layout;
pub mod progress;
pub mod record;
pub mod trainer;

pub use artifacts::{artifact_checksum, sha256_dir, sha256_file};
pub use corpus::{CorpusWriter, parse_corpus_line, read_corpus};
pub use error::{TrainingError, TrainingResult};
pub use job::{JobId, JobSubmission, MAX_PRIORITY, MIN_PRIORITY, TrainerType, TrainingJob};
pub use layout::ForgeLayout;
pub use progress::{NoopProgressSink, ProgressEvent, ProgressSink, TracingProgressSink};
pub use record::{RecordMetadata, TrainingRecord};
pub use trainer::{Trainer, TrainingMetrics, TrainingOutcome};
