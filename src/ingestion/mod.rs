// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Document ingestion pipeline: chunk text, embed each chunk, and upsert the
//! resulting points into the target collection, bootstrapping the collection
//! on first use.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::chunker::TextChunker;
use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::vector::{Distance, VectorError, VectorPoint, VectorStore};

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Vector store failed: {0}")]
    Store(#[from] VectorError),
    #[error("Embedding count mismatch: {chunks} chunks, {vectors} vectors")]
    CountMismatch { chunks: usize, vectors: usize },
}

/// Turns raw text into searchable vector points.
///
/// Failure semantics: an embedding failure for any chunk aborts the whole
/// ingestion before anything is written; an upsert failure surfaces as-is.
/// Nothing is retried.
pub struct IngestionPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
    distance: Distance,
}

impl IngestionPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        distance: Distance,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
            collection: collection.into(),
            distance,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ingest one document. Returns the number of points written.
    pub async fn ingest(&self, text: &str) -> Result<usize, IngestionError> {
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(IngestionError::CountMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let points: Vec<VectorPoint> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint::new(vector, chunk.text))
            .collect();

        self.ensure_collection().await?;
        let count = points.len();
        self.store.upsert(&self.collection, points).await?;
        info!(collection = %self.collection, count, "Ingested document");
        Ok(count)
    }

    /// Create the target collection if it is missing. An existence check
    /// that errors is treated the same as "not found": attempt the create
    /// and rely on the store's idempotent create to resolve the race.
    async fn ensure_collection(&self) -> Result<(), IngestionError> {
        match self.store.collection_exists(&self.collection).await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                info!(collection = %self.collection, "Collection not found, creating");
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Collection check failed, attempting create");
            }
        }
        self.store
            .create_collection(&self.collection, self.embedder.dimension(), self.distance)
            .await?;
        Ok(())
    }
}
