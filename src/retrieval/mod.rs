// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval service: embed a query, search the vector store, and return
//! ranked chunks above a similarity threshold.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::vector::{VectorError, VectorStore};

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.8;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Vector store failed: {0}")]
    Store(#[from] VectorError),
    #[error("Search hit {0} is missing its content payload")]
    MissingPayload(String),
}

/// A retrieved chunk with its similarity score, ordered descending by score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub content: String,
}

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
    limit: usize,
    score_threshold: f32,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            limit: DEFAULT_SEARCH_LIMIT,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }

    pub fn with_policy(mut self, limit: usize, score_threshold: f32) -> Self {
        self.limit = limit;
        self.score_threshold = score_threshold;
        self
    }

    /// Retrieve ranked context for a query using the configured policy.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.retrieve_with(query, self.limit, self.score_threshold)
            .await
    }

    /// Retrieve with per-call limit and threshold overrides.
    ///
    /// The query is embedded whole (queries are never chunked). Results are
    /// re-sorted by descending score before the threshold filter: provider
    /// ordering is not assumed, and already-ranked output is left unchanged
    /// by the sort.
    pub async fn retrieve_with(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let query_vector = self.embedder.embed(query).await?;
        let mut hits = self
            .store
            .search(
                &self.collection,
                query_vector,
                limit,
                Some(score_threshold),
            )
            .await?;

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut chunks = Vec::with_capacity(hits.len());
        for hit in hits {
            if hit.score < score_threshold {
                continue;
            }
            let content = hit
                .payload
                .get("content")
                .cloned()
                .ok_or_else(|| RetrievalError::MissingPayload(hit.id.clone()))?;
            chunks.push(ScoredChunk {
                id: hit.id,
                score: hit.score,
                content,
            });
        }
        debug!(count = chunks.len(), "Retrieved context chunks");
        Ok(chunks)
    }

    /// Join surviving chunk contents into one context block. `None` when no
    /// chunk survived, so callers can distinguish "no context" from a store
    /// or provider failure (which is an `Err` from `retrieve`).
    pub fn build_context(chunks: &[ScoredChunk]) -> Option<String> {
        if chunks.is_empty() {
            return None;
        }
        Some(
            chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_newline_joined() {
        let chunks = vec![
            ScoredChunk {
                id: "a".to_string(),
                score: 0.95,
                content: "first".to_string(),
            },
            ScoredChunk {
                id: "b".to_string(),
                score: 0.82,
                content: "second".to_string(),
            },
        ];
        assert_eq!(
            RetrievalService::build_context(&chunks).unwrap(),
            "first\nsecond"
        );
    }

    #[test]
    fn empty_results_yield_no_context() {
        assert!(RetrievalService::build_context(&[]).is_none());
    }
}
