//! Tuneforge Orchestrator
//!
//! Runs training jobs under a concurrency ceiling:
//! - Priority + FIFO pending queue
//! - Monotonic job state machine
//! - Cooperative cancellation with a grace-period fallback
//! - Broadcast job notifications

pub mod error;
pub mod job;
pub mod lifecycle;
pub mod manager;
pub mod progress;
pub mod queue;

pub use error::{JobError, Result};
pub use job::Job;
pub use lifecycle::JobState;
pub use manager::{JobManager, JobManagerConfig};
pub use progress::{JobEvent, JobEventBus, JobMetrics};
pub use queue::PendingQueue;
