//! Tuneforge CLI - command-line interface for adapter lifecycle orchestration
//!
//! Provides the `tuneforge` command for retrieving training corpora,
//! administering the adapter registry, managing golden datasets, evaluating
//! adapter versions, and running the full lifecycle pipeline.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::context::{CliContext, load_config};
use commands::{AdaptersCommand, EvaluateCommand, GoldenCommand, RetrieveCommand, RunCommand};
use commands::{adapters, evaluate, golden, retrieve, run};

/// Tuneforge CLI - adapter lifecycle orchestration
#[derive(Parser, Debug)]
#[command(
    name = "tuneforge",
    author,
    version,
    about = "Tuneforge - retrieve, train, register, evaluate, and approve adapters",
    long_about = "Tuneforge drives adapters through their lifecycle: streaming a training corpus from a search source,\ntraining through a job pool, registering versioned artifacts, and approving them against golden datasets."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error); defaults to the configured log_level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Workspace directory holding .tuneforge/ (overrides the configured workspace)
    #[arg(short = 'w', long, global = true)]
    workspace: Option<PathBuf>,

    /// Configuration file used instead of ./tuneforge.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a training corpus from the search source into a JSONL file
    Retrieve(RetrieveCommand),

    /// Adapter registry administration
    #[command(subcommand)]
    Adapters(AdaptersCommand),

    /// Golden dataset management
    #[command(subcommand)]
    Golden(GoldenCommand),

    /// Evaluate an adapter version against a golden dataset
    Evaluate(EvaluateCommand),

    /// Run retrieval, training, registration, evaluation, and approval
    Run(RunCommand),
}

fn parse_level(raw: &str) -> Level {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref(), args.workspace)?;

    // Initialize tracing
    let level = parse_level(args.log_level.as_deref().or(config.log_level.as_deref()).unwrap_or("info"));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = CliContext::open(config)?;

    match args.command {
        Command::Retrieve(command) => retrieve::execute(&ctx, command, args.json).await?,
        Command::Adapters(command) => adapters::execute(&ctx, command, args.json)?,
        Command::Golden(command) => golden::execute(&ctx, command, args.json)?,
        Command::Evaluate(command) => evaluate::execute(&ctx, command, args.json).await?,
        Command::Run(command) => run::execute(&ctx, command, args.json).await?,
    }

    Ok(())
}
