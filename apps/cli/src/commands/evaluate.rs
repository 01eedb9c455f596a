//! Evaluate command implementation.

use super::context::CliContext;
use super::types::EvaluateCommand;
use anyhow::Result;
use colored::Colorize;
use tuneforge_core::EvaluationResult;

pub async fn execute(ctx: &CliContext, command: EvaluateCommand, json_output: bool) -> Result<()> {
    let evaluator = ctx.evaluator()?;
    let inference = ctx.inference()?;
    let result = evaluator.evaluate(&command.version, &command.dataset, inference.as_ref()).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_evaluation(&result, ctx.config.evaluation.approval_threshold);
    Ok(())
}

pub fn print_evaluation(result: &EvaluationResult, approval_threshold: f64) {
    println!();
    println!("{}", "Evaluation".bold().cyan());
    println!("  ID:        {}", result.id);
    let score = format!("{:.1}", result.aggregate_score);
    let score = if result.meets(approval_threshold) { score.green() } else { score.yellow() };
    println!("  Aggregate: {} {}", score, format!("(approval threshold {:.1})", approval_threshold).dimmed());
    println!("  Pass rate: {:.0}%", result.pass_rate * 100.0);
    if result.failed_samples > 0 {
        println!("  Failed:    {}", result.failed_samples.to_string().red());
    }
    println!();
    for sample in &result.samples {
        match &sample.error {
            Some(error) => println!("  {} {:<16} {}", "✗".red(), sample.sample_id, error.dimmed()),
            None if sample.passed => println!("  {} {:<16} {:.1}", "✓".green(), sample.sample_id, sample.aggregate),
            None => println!("  {} {:<16} {:.1}", "·".yellow(), sample.sample_id, sample.aggregate),
        }
    }
    println!();
}
