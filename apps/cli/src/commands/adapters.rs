//! Adapter registry commands.

use super::context::CliContext;
use super::types::AdaptersCommand;
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use serde_json::json;
use tuneforge_core::registry::{AdapterVersion, ApprovalStatus, VersionDiff};
use tuneforge_core::{Approval, BumpKind, RegisterRequest};

pub fn execute(ctx: &CliContext, command: AdaptersCommand, json_output: bool) -> Result<()> {
    match command {
        AdaptersCommand::List { family } => list(ctx, family, json_output),
        AdaptersCommand::Register { family, domain, artifact, base_model, method, bump } => {
            let bump: BumpKind = bump.parse().map_err(|e: String| anyhow!(e))?;
            let request = RegisterRequest {
                domain: domain.unwrap_or_else(|| family.clone()),
                family,
                method,
                artifact_path: artifact,
                base_model,
                hyperparams: Default::default(),
                bump,
                job_id: None,
            };
            let version = ctx.registry().register(request).context("Failed to register adapter version")?;
            print_version(&version, "Registered", json_output)
        }
        AdaptersCommand::Show { id } => {
            let version = ctx.registry().get(&id)?;
            print_version(&version, "Adapter Version", json_output)
        }
        AdaptersCommand::Approve { id, actor, evaluation, threshold, note } => {
            let approval = match evaluation {
                Some(evaluation_id) => Approval::Evaluation {
                    actor,
                    evaluation_id,
                    threshold: threshold.unwrap_or(ctx.config.evaluation.approval_threshold),
                },
                None => Approval::HumanOverride { actor, note: note.unwrap_or_default() },
            };
            let version = ctx.registry().approve(&id, approval)?;
            print_version(&version, "Approved", json_output)
        }
        AdaptersCommand::Reject { id, actor, reason } => {
            let version = ctx.registry().reject(&id, &actor, &reason)?;
            print_version(&version, "Rejected", json_output)
        }
        AdaptersCommand::Diff { from, to } => {
            let diff = ctx.registry().diff(&from, &to)?;
            print_diff(&diff, json_output)
        }
        AdaptersCommand::Verify { id } => verify(ctx, &id, json_output),
        AdaptersCommand::Current { family } => {
            let current = ctx.registry().current(&family)?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&current)?);
                return Ok(());
            }
            match current {
                Some(version) => print_version(&version, "Current", false),
                None => {
                    println!();
                    println!("  {}", format!("No approved version in family '{}'.", family).dimmed());
                    println!();
                    Ok(())
                }
            }
        }
    }
}

fn status_label(status: ApprovalStatus) -> colored::ColoredString {
    match status {
        ApprovalStatus::Pending => status.as_str().yellow(),
        ApprovalStatus::Approved => status.as_str().green(),
        ApprovalStatus::Rejected => status.as_str().red(),
    }
}

fn list(ctx: &CliContext, family: Option<String>, json_output: bool) -> Result<()> {
    let registry = ctx.registry();

    let Some(family) = family else {
        let families = registry.list_families()?;
        if json_output {
            println!("{}", serde_json::to_string_pretty(&families)?);
            return Ok(());
        }

        println!();
        println!("{}", format!("Adapter Families ({})", families.len()).bold().cyan());
        println!();
        if families.is_empty() {
            println!("  {}", "No adapter families registered.".dimmed());
            println!();
            return Ok(());
        }
        println!("{:<24} {:<16} {}", "Family", "Domain", "Base Model");
        println!("{}", "─".repeat(72));
        for f in families {
            println!("{:<24} {:<16} {}", f.name.cyan(), f.domain, f.base_model.dimmed());
        }
        println!();
        return Ok(());
    };

    let versions = registry.list_versions(&family)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("{} ({} versions)", family, versions.len()).bold().cyan());
    println!();
    println!("{:<10} {:<10} {:<38} {}", "Version", "Status", "ID", "Created");
    println!("{}", "─".repeat(90));
    for v in versions {
        println!(
            "{:<10} {:<10} {:<38} {}",
            v.version.to_string().cyan(),
            status_label(v.status),
            v.id,
            v.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    println!();
    Ok(())
}

fn print_version(version: &AdapterVersion, title: &str, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(version)?);
        return Ok(());
    }

    println!();
    println!("{} {}", format!("{}:", title).bold().cyan(), version.label().bold());
    println!();
    println!("  ID:         {}", version.id);
    println!("  Status:     {}", status_label(version.status));
    println!("  Base model: {}", version.base_model);
    println!("  Method:     {}", version.method);
    println!("  Artifact:   {}", version.artifact_path.display());
    println!("  Checksum:   {}", version.checksum.dimmed());
    if let Some(job_id) = &version.job_id {
        println!("  Job:        {}", job_id);
    }
    println!();
    println!("  {}", "Audit".bold());
    for entry in &version.audit {
        println!(
            "    {} {:<11} {:<20} {}",
            entry.at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            format!("{:?}", entry.action).to_lowercase(),
            entry.actor,
            entry.detail.dimmed()
        );
    }
    println!();
    Ok(())
}

fn print_diff(diff: &VersionDiff, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(diff)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Diff {} -> {}", diff.from, diff.to).bold().cyan());
    println!();
    if diff.is_empty() {
        println!("  {}", "No differences.".dimmed());
        println!();
        return Ok(());
    }
    for change in &diff.changes {
        println!("  {}", change.field.bold());
        println!("    {} {}", "-".red(), change.before.to_string().red());
        println!("    {} {}", "+".green(), change.after.to_string().green());
    }
    println!();
    Ok(())
}

fn verify(ctx: &CliContext, id: &str, json_output: bool) -> Result<()> {
    let valid = ctx.registry().validate_checksum(id)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "id": id, "valid": valid }))?);
        return Ok(());
    }

    if valid {
        println!("{} Artifact checksum matches for {}", "✓".green(), id.cyan());
    } else {
        println!("{} Artifact checksum does not match for {}", "✗".red(), id.cyan());
    }
    Ok(())
}
