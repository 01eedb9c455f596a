//! Command type definitions shared between main.rs and the command modules.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct RetrieveCommand {
    /// Search query text
    pub query: String,

    /// Maximum number of raw results requested from the search source
    #[arg(short = 'k', long, default_value_t = 100)]
    pub top_k: usize,

    /// Discard records scoring below this (0.0-1.0)
    #[arg(long, default_value_t = 0.0)]
    pub min_quality: f64,

    /// Results requested per page (defaults to retrieval.default_batch_size)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Metadata filter as key=value (repeatable)
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Corpus output path (defaults to .tuneforge/corpora/<run-id>.jsonl)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Collect every record before writing instead of streaming
    #[arg(long)]
    pub buffered: bool,

    /// Stream records to stdout as JSON lines instead of writing a file
    #[arg(long, conflicts_with_all = ["output", "buffered"])]
    pub stdout: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdaptersCommand {
    /// List adapter families, or the versions of one family
    List {
        /// Show versions of this family
        #[arg(long)]
        family: Option<String>,
    },

    /// Register an artifact as the next version of a family
    Register {
        /// Adapter family name
        #[arg(long)]
        family: String,

        /// Domain recorded when the family is first created (defaults to the family)
        #[arg(long)]
        domain: Option<String>,

        /// Artifact file or directory
        #[arg(long)]
        artifact: PathBuf,

        /// Base model the adapter was trained on
        #[arg(long)]
        base_model: String,

        /// Fine-tuning method (lora, qlora, ...)
        #[arg(long, default_value = "lora")]
        method: String,

        /// Version bump: patch, minor, or major
        #[arg(long, default_value = "patch")]
        bump: String,
    },

    /// Show one adapter version with its audit trail
    Show {
        /// Adapter version id
        id: String,
    },

    /// Approve a pending version
    Approve {
        /// Adapter version id
        id: String,

        /// Who is approving
        #[arg(long, default_value = "cli")]
        actor: String,

        /// Evaluation backing the approval
        #[arg(long, conflicts_with = "note")]
        evaluation: Option<String>,

        /// Score threshold for --evaluation (defaults to evaluation.approval_threshold)
        #[arg(long, requires = "evaluation")]
        threshold: Option<f64>,

        /// Human override note, used instead of an evaluation
        #[arg(long, required_unless_present = "evaluation")]
        note: Option<String>,
    },

    /// Reject a pending version
    Reject {
        /// Adapter version id
        id: String,

        /// Who is rejecting
        #[arg(long, default_value = "cli")]
        actor: String,

        /// Reason recorded in the audit trail
        #[arg(long)]
        reason: String,
    },

    /// Field-level differences between two versions
    Diff {
        /// First adapter version id
        from: String,

        /// Second adapter version id
        to: String,
    },

    /// Recompute an artifact checksum and compare it with the recorded one
    Verify {
        /// Adapter version id
        id: String,
    },

    /// Highest approved version of a family
    Current {
        /// Adapter family name
        family: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum GoldenCommand {
    /// Import a golden dataset from a JSONL file
    Import {
        /// Dataset name; importing an existing name creates its next version
        name: String,

        /// JSONL file with one sample per line
        file: PathBuf,
    },

    /// List golden datasets
    List,

    /// Show one golden dataset with its samples
    Show {
        /// Golden dataset id
        id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateCommand {
    /// Adapter version id
    pub version: String,

    /// Golden dataset id
    #[arg(long)]
    pub dataset: String,
}

#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Domain of the adapter
    #[arg(long)]
    pub domain: String,

    /// Adapter family (defaults to the domain)
    #[arg(long)]
    pub family: Option<String>,

    /// Search query for the training corpus
    #[arg(long)]
    pub query: String,

    /// Maximum number of raw results requested from the search source
    #[arg(short = 'k', long, default_value_t = 100)]
    pub top_k: usize,

    /// Discard records scoring below this (0.0-1.0)
    #[arg(long, default_value_t = 0.0)]
    pub min_quality: f64,

    /// Golden dataset to evaluate against
    #[arg(long)]
    pub golden: String,

    /// Approval threshold 0-100 (defaults to evaluation.approval_threshold)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Trainer type: lora, qlora, dora, full
    #[arg(long, default_value = "lora")]
    pub trainer_type: String,

    /// Trainer configuration reference
    #[arg(long)]
    pub config_ref: String,

    /// Base model to fine-tune
    #[arg(long)]
    pub base_model: String,

    /// Method recorded on the adapter version (defaults to the trainer type)
    #[arg(long)]
    pub method: Option<String>,

    /// Version bump: patch, minor, or major
    #[arg(long, default_value = "patch")]
    pub bump: String,

    /// Job priority 1-10
    #[arg(long, default_value_t = 5)]
    pub priority: u8,
}
