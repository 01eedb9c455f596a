//! Command implementations for the Tuneforge CLI.

pub mod adapters;
pub mod context;
pub mod evaluate;
pub mod golden;
pub mod retrieve;
pub mod run;
pub mod types;

pub use types::{AdaptersCommand, EvaluateCommand, GoldenCommand, RetrieveCommand, RunCommand};
