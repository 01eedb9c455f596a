//! Retrieve command implementation.

use super::context::CliContext;
use super::types::RetrieveCommand;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tuneforge_core::{RetrievalQuery, StreamingRetriever};

/// Parses a `key=value` filter. Values that parse as JSON keep their type,
/// anything else is a string.
pub fn parse_filter(raw: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid filter '{}': expected KEY=VALUE", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid filter '{}': key is empty", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub async fn execute(ctx: &CliContext, command: RetrieveCommand, json_output: bool) -> Result<()> {
    let batch_size = command.batch_size.unwrap_or(ctx.config.retrieval.default_batch_size);
    let mut query =
        RetrievalQuery::new(command.query, command.top_k).with_min_quality(command.min_quality).with_batch_size(batch_size);
    for raw in &command.filters {
        let (key, value) = parse_filter(raw)?;
        query = query.with_filter(key, value);
    }

    let mut retriever = ctx.retriever()?;
    if command.stdout {
        return stream_to_stdout(&retriever, &query).await;
    }

    let output = command
        .output
        .unwrap_or_else(|| ctx.layout.corpus_path(&chrono::Utc::now().format("corpus-%Y%m%d-%H%M%S").to_string()));

    if command.buffered {
        retriever = retriever.with_streaming(false);
    }
    let summary = retriever
        .write_corpus(&query, &output)
        .await
        .with_context(|| format!("Retrieval into {} failed", output.display()))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("{}", "Corpus written".bold().green());
    println!("  Path:      {}", summary.path.display().to_string().cyan());
    println!("  Records:   {}", summary.records);
    println!("  Batches:   {}", summary.batches);
    println!("  Fetched:   {}", summary.fetched);
    println!("  Discarded: {}", summary.discarded.to_string().dimmed());
    println!();
    Ok(())
}

/// Writes each record as one JSON line, flushed as it arrives.
async fn stream_to_stdout(retriever: &StreamingRetriever, query: &RetrievalQuery) -> Result<()> {
    let mut lines = retriever.stream_lines(query)?;
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next().await {
        stdout.write_all(line?.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
