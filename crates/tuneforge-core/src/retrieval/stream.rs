use super::quality::{QualityScorer, clamp_unit};
use super::{RetrievalQuery, SearchRequest, SearchSource};
use crate::error::{ForgeError, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tracing::{debug, info, warn};
use tuneforge_training::{CorpusWriter, TrainingRecord};

/// Counters for one retrieval stream, readable while it runs.
#[derive(Debug, Default)]
pub struct RetrievalStats {
    batches: AtomicU64,
    fetched: AtomicU64,
    yielded: AtomicU64,
    discarded: AtomicU64,
}

impl RetrievalStats {
    /// Batches requested from the source.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Raw results received.
    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }

    /// Records handed to the consumer so far.
    pub fn yielded(&self) -> u64 {
        self.yielded.load(Ordering::Relaxed)
    }

    /// Results below the quality threshold.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// Lazy record sequence plus its live counters.
pub struct RecordStream {
    inner: BoxStream<'static, Result<TrainingRecord>>,
    stats: Arc<RetrievalStats>,
}

impl RecordStream {
    #[must_use]
    pub fn stats(&self) -> Arc<RetrievalStats> {
        Arc::clone(&self.stats)
    }
}

impl Stream for RecordStream {
    type Item = Result<TrainingRecord>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream").field("stats", &self.stats).finish_non_exhaustive()
    }
}

/// Outcome of materializing a corpus file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub path: PathBuf,
    pub records: u64,
    pub batches: u64,
    pub fetched: u64,
    pub discarded: u64,
}

struct Cursor {
    source: Arc<dyn SearchSource>,
    scorer: Arc<QualityScorer>,
    query: RetrievalQuery,
    offset: usize,
    fetched: usize,
    exhausted: bool,
    stats: Arc<RetrievalStats>,
}

impl Cursor {
    /// Fetches and filters the next batch. `None` once `top_k` results were
    /// requested or the source ran dry.
    async fn next_batch(mut self) -> Result<Option<(Vec<TrainingRecord>, Self)>> {
        if self.exhausted || self.fetched >= self.query.top_k {
            return Ok(None);
        }

        let limit = self.query.batch_size.min(self.query.top_k - self.fetched);
        let request = SearchRequest {
            query_text: self.query.query_text.clone(),
            filters: self.query.filters.clone(),
            offset: self.offset,
            limit,
        };
        self.stats.batches.fetch_add(1, Ordering::Relaxed);
        debug!(offset = self.offset, limit, "Requesting retrieval batch");

        let mut results = self.source.search(&request).await.inspect_err(|e| {
            warn!(offset = self.offset, error = %e, "Retrieval batch failed");
        })?;
        if results.len() < limit {
            self.exhausted = true;
        }
        results.truncate(limit);

        let received = results.len();
        self.fetched += received;
        self.offset += received;
        self.stats.fetched.fetch_add(received as u64, Ordering::Relaxed);

        let mut records = Vec::with_capacity(received);
        for (idx, doc) in results.into_iter().enumerate() {
            let quality = self.scorer.score(&doc);
            if quality < self.query.min_quality_score {
                self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            let id = if doc.id.trim().is_empty() {
                (request.offset + idx).to_string()
            } else {
                doc.id
            };
            records.push(TrainingRecord {
                id,
                text: doc.text,
                source: doc.source,
                quality_score: quality,
                relevance_score: clamp_unit(doc.score),
                metadata: doc.metadata,
            });
        }

        Ok(Some((records, self)))
    }
}

/// Pulls ranked documents from a [`SearchSource`] as training records.
///
/// Holds no state across calls; every stream restarts from offset zero.
#[derive(Clone)]
pub struct StreamingRetriever {
    source: Arc<dyn SearchSource>,
    scorer: Arc<QualityScorer>,
    streaming_enabled: bool,
}

impl StreamingRetriever {
    pub fn new(source: Arc<dyn SearchSource>, scorer: QualityScorer) -> Result<Self> {
        scorer.validate()?;
        Ok(Self { source, scorer: Arc::new(scorer), streaming_enabled: true })
    }

    /// With streaming disabled, `write_corpus` collects every record before
    /// touching the output file.
    #[must_use]
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming_enabled = enabled;
        self
    }

    /// Validates the query and returns the lazy record stream. No request is
    /// issued until the stream is polled.
    pub fn stream_datasets(&self, query: &RetrievalQuery) -> Result<RecordStream> {
        query.validate()?;
        let stats = Arc::new(RetrievalStats::default());
        let cursor = Cursor {
            source: Arc::clone(&self.source),
            scorer: Arc::clone(&self.scorer),
            query: query.clone(),
            offset: 0,
            fetched: 0,
            exhausted: false,
            stats: Arc::clone(&stats),
        };

        let counters = Arc::clone(&stats);
        let inner = stream::try_unfold(cursor, Cursor::next_batch)
            .map_ok(|batch| stream::iter(batch.into_iter().map(Ok::<_, ForgeError>)))
            .try_flatten()
            .inspect_ok(move |_| {
                counters.yielded.fetch_add(1, Ordering::Relaxed);
            })
            .boxed();

        Ok(RecordStream { inner, stats })
    }

    /// The same sequence, one JSON line per record (newline-terminated).
    pub fn stream_lines(&self, query: &RetrievalQuery) -> Result<BoxStream<'static, Result<String>>> {
        let records = self.stream_datasets(query)?;
        Ok(records
            .map(|item| {
                item.and_then(|record| {
                    let mut line = serde_json::to_string(&record).map_err(ForgeError::from)?;
                    line.push('\n');
                    Ok(line)
                })
            })
            .boxed())
    }

    /// Writes the query's records to `path` as JSONL.
    ///
    /// In streaming mode each record is flushed as it arrives, so on failure
    /// the file holds every record received before it.
    pub async fn write_corpus(&self, query: &RetrievalQuery, path: &Path) -> Result<CorpusSummary> {
        let mut records = self.stream_datasets(query)?;
        let stats = records.stats();

        let written = if self.streaming_enabled {
            let mut writer = CorpusWriter::create(path).await?;
            while let Some(record) = records.next().await {
                writer.write_record(&record?).await?;
            }
            writer.finish().await?
        } else {
            let all: Vec<TrainingRecord> = records.try_collect().await?;
            let mut writer = CorpusWriter::create(path).await?;
            for record in &all {
                writer.write_record(record).await?;
            }
            writer.finish().await?
        };

        let summary = CorpusSummary {
            path: path.to_path_buf(),
            records: written,
            batches: stats.batches(),
            fetched: stats.fetched(),
            discarded: stats.discarded(),
        };
        info!(
            path = %path.display(),
            records = summary.records,
            batches = summary.batches,
            discarded = summary.discarded,
            "Corpus written"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for StreamingRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingRetriever")
            .field("scorer", &self.scorer)
            .field("streaming_enabled", &self.streaming_enabled)
            .finish_non_exhaustive()
    }
}
