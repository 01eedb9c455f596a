//! Search collaborator implementations.

use super::{RawDocument, SearchRequest, SearchSource};
use crate::error::{ForgeError, Result};
use crate::http::{DEFAULT_TIMEOUT, build_client, post_json};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RawDocument>,
}

/// Search service reached over HTTP.
///
/// `POST {endpoint}` with a [`SearchRequest`], expecting
/// `{"results": [RawDocument, ...]}` in rank order.
#[derive(Debug, Clone)]
pub struct HttpSearchSource {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpSearchSource {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), http: build_client(DEFAULT_TIMEOUT) }
    }
}

#[async_trait]
impl SearchSource for HttpSearchSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawDocument>> {
        let response: SearchResponse = post_json(&self.http, &self.endpoint, "search", request).await?;
        Ok(response.results)
    }
}

/// Serves documents from a local JSONL file, one [`RawDocument`] per line.
///
/// A document matches when its text contains any query term
/// (case-insensitive) and every filter equals the metadata value under the
/// same key. Matches keep file order. The file is re-read on every request.
#[derive(Debug, Clone)]
pub struct JsonlSearchSource {
    path: PathBuf,
}

impl JsonlSearchSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn matches(doc: &RawDocument, terms: &[String], request: &SearchRequest) -> bool {
        let text = doc.text.to_lowercase();
        let term_match = terms.is_empty() || terms.iter().any(|t| text.contains(t.as_str()));
        term_match && request.filters.iter().all(|(key, value)| doc.metadata.get(key) == Some(value))
    }
}

#[async_trait]
impl SearchSource for JsonlSearchSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawDocument>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ForgeError::transport("search", format!("{}: {e}", self.path.display())))?;

        let terms: Vec<String> = request.query_text.split_whitespace().map(str::to_lowercase).collect();

        let mut matched = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let doc: RawDocument = serde_json::from_str(line).map_err(|e| {
                ForgeError::transport("search", format!("{} line {}: {e}", self.path.display(), idx + 1))
            })?;
            if Self::matches(&doc, &terms, request) {
                matched.push(doc);
            }
        }

        Ok(matched.into_iter().skip(request.offset).take(request.limit).collect())
    }
}
