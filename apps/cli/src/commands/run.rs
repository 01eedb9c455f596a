//! Run command: one full lifecycle pass.

use super::context::CliContext;
use super::evaluate::print_evaluation;
use super::types::RunCommand;
use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;
use tuneforge_core::{
    ApprovalDecision, BumpKind, LifecyclePipeline, LifecycleRequest, LifecycleResult, PipelineParts,
    RetrievalQuery,
};
use tuneforge_orchestrator::{JobEvent, JobManager, JobState};
use tuneforge_training::TrainerType;

fn build_request(ctx: &CliContext, command: RunCommand) -> Result<LifecycleRequest> {
    let trainer_type: TrainerType = command.trainer_type.parse()?;
    let bump: BumpKind = command.bump.parse().map_err(|e: String| anyhow!(e))?;
    let query = RetrievalQuery::new(command.query, command.top_k)
        .with_min_quality(command.min_quality)
        .with_batch_size(ctx.config.retrieval.default_batch_size);

    Ok(LifecycleRequest {
        domain: command.domain,
        family: command.family,
        query,
        golden_dataset_id: command.golden,
        approval_threshold: command.threshold.unwrap_or(ctx.config.evaluation.approval_threshold),
        trainer_type,
        config_ref: command.config_ref,
        base_model: command.base_model,
        method: command.method.unwrap_or_else(|| trainer_type.as_str().to_string()),
        hyperparams: Default::default(),
        bump,
        priority: command.priority,
    })
}

fn spawn_progress_printer(jobs: &JobManager) {
    let mut events = jobs.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(JobEvent::Submitted { job_id, priority }) => {
                    println!("  {} job {} (priority {})", "queued".dimmed(), job_id, priority);
                }
                Ok(JobEvent::Started { job_id }) => println!("  {} job {}", "training".cyan(), job_id),
                Ok(JobEvent::Completed { artifact_path, .. }) => {
                    println!("  {} {}", "artifact".green(), artifact_path.display());
                }
                Ok(JobEvent::Failed { error, .. }) => println!("  {} {}", "failed".red(), error),
                Ok(JobEvent::Cancelled { forced, .. }) => {
                    println!("  {}{}", "cancelled".yellow(), if forced { " (forced)" } else { "" });
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn cancel_running(jobs: &JobManager) {
    for job in jobs.list(Some(JobState::Running)) {
        if let Err(e) = jobs.cancel(&job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to cancel job");
        }
    }
    jobs.shutdown();
}

pub async fn execute(ctx: &CliContext, command: RunCommand, json_output: bool) -> Result<()> {
    let request = build_request(ctx, command)?;

    let jobs = ctx.job_manager()?;
    let parts = PipelineParts {
        retriever: ctx.retriever()?,
        jobs: jobs.clone(),
        registry: ctx.registry(),
        golden: ctx.golden(),
        evaluator: ctx.evaluator()?,
        inference: ctx.inference()?,
        layout: ctx.layout.clone(),
    };
    let pipeline = LifecyclePipeline::new(parts).with_auto_reject(ctx.config.evaluation.auto_reject);

    if !json_output {
        println!();
        println!("{}", format!("Lifecycle run: {}", request.family()).bold().cyan());
        spawn_progress_printer(&jobs);
    }

    let result = tokio::select! {
        result = pipeline.run(&request) => result?,
        _ = tokio::signal::ctrl_c() => {
            cancel_running(&jobs).await;
            bail!("Interrupted; running training jobs were cancelled");
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result, request.approval_threshold);
    Ok(())
}

fn print_result(result: &LifecycleResult, approval_threshold: f64) {
    println!();
    println!("  Run:     {}", result.run_id.dimmed());
    println!("  Corpus:  {} records ({} discarded)", result.corpus.records, result.corpus.discarded);
    println!("  Version: {} {}", result.version.label().bold(), result.version.id.dimmed());
    print_evaluation(&result.evaluation, approval_threshold);

    let decision = match result.decision {
        ApprovalDecision::Approved => "approved".bold().green(),
        ApprovalDecision::Pending => "pending review".bold().yellow(),
        ApprovalDecision::Rejected => "rejected".bold().red(),
    };
    println!("  Decision: {}", decision);
    println!();
}
