//! Line-delimited JSON corpus files.
//!
//! One `TrainingRecord` per line, UTF-8. Each line parses on its own, which is
//! what external trainers rely on.

use crate::error::{TrainingError, TrainingResult};
use crate::record::TrainingRecord;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Incremental corpus writer.
///
/// Every record is flushed as soon as it is written, so a failure part-way
/// through leaves the already-written prefix on disk.
pub struct CorpusWriter {
    out: BufWriter<File>,
    written: u64,
}

impl CorpusWriter {
    /// Creates (or truncates) the corpus file, creating parent directories.
    pub async fn create(path: &Path) -> TrainingResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(path).await?;
        Ok(Self { out: BufWriter::new(file), written: 0 })
    }

    pub async fn write_record(&mut self, record: &TrainingRecord) -> TrainingResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        self.written += 1;
        Ok(())
    }

    /// Flushes and syncs the file, returning the number of records written.
    pub async fn finish(mut self) -> TrainingResult<u64> {
        self.out.flush().await?;
        self.out.get_mut().sync_all().await?;
        Ok(self.written)
    }
}

/// Parses a single corpus line.
pub fn parse_corpus_line(line: &str) -> TrainingResult<TrainingRecord> {
    Ok(serde_json::from_str(line)?)
}

/// Reads a whole corpus back into memory. Blank lines are skipped, and every
/// record must pass [`TrainingRecord::validate`].
pub fn read_corpus(path: &Path) -> TrainingResult<Vec<TrainingRecord>> {
    let contents = std::fs::read_to_string(path)?;
    let mut records = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = parse_corpus_line(line).map_err(|e| {
            TrainingError::Corpus(format!("failed to parse corpus line {}: {}", idx + 1, e))
        })?;
        record.validate().map_err(|e| TrainingError::Corpus(format!("corpus line {}: {}", idx + 1, e)))?;
        records.push(record);
    }

    Ok(records)
}
