//! Golden dataset commands.

use super::context::CliContext;
use super::types::GoldenCommand;
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tuneforge_core::evaluation::load_golden_samples;

pub fn execute(ctx: &CliContext, command: GoldenCommand, json_output: bool) -> Result<()> {
    match command {
        GoldenCommand::Import { name, file } => {
            let samples =
                load_golden_samples(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let dataset = ctx.golden().create_golden_dataset(&name, samples)?;

            if json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "id": dataset.id,
                        "name": dataset.name,
                        "version": dataset.version,
                        "samples": dataset.samples.len(),
                    }))?
                );
                return Ok(());
            }

            println!();
            println!("{}", "Golden dataset imported".bold().green());
            println!("  ID:      {}", dataset.id.cyan());
            println!("  Name:    {} v{}", dataset.name, dataset.version);
            println!("  Samples: {}", dataset.samples.len());
            println!();
            Ok(())
        }
        GoldenCommand::List => {
            let datasets = ctx.golden().list()?;

            if json_output {
                let out: Vec<_> = datasets
                    .iter()
                    .map(|d| {
                        json!({
                            "id": d.id,
                            "name": d.name,
                            "version": d.version,
                            "samples": d.samples.len(),
                            "created_at": d.created_at,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!();
            println!("{}", format!("Golden Datasets ({})", datasets.len()).bold().cyan());
            println!();
            if datasets.is_empty() {
                println!("  {}", "No golden datasets found.".dimmed());
                println!();
                println!("  {}", "Tip: import one with `tuneforge golden import <name> <file.jsonl>`.".dimmed());
                return Ok(());
            }
            println!("{:<38} {:<24} {:<8} {}", "ID", "Name", "Version", "Samples");
            println!("{}", "─".repeat(80));
            for d in datasets {
                println!("{:<38} {:<24} {:<8} {}", d.id.cyan(), d.name, d.version, d.samples.len());
            }
            println!();
            Ok(())
        }
        GoldenCommand::Show { id } => {
            let dataset = ctx.golden().get(&id)?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&dataset)?);
                return Ok(());
            }

            println!();
            println!("{}", format!("{} v{}", dataset.name, dataset.version).bold().cyan());
            println!();
            for sample in &dataset.samples {
                println!("  {} {}", sample.id.bold(), format!("({:?})", sample.difficulty).to_lowercase().dimmed());
                println!("    {}", sample.prompt);
            }
            println!();
            Ok(())
        }
    }
}
