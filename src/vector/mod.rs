// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector store abstraction: collections of fixed-dimension points with
//! nearest-neighbor search.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub use client::{MemoryVectorStore, QdrantClient, VectorStoreConfig};

#[derive(Error, Debug)]
pub enum VectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Vector store request timed out")]
    Timeout,
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Dimension mismatch: collection expects {expected}, point has {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Distance metric declared per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

/// A point ready for upsert: unique id, embedding vector, and a payload
/// carrying at least the `content` key with the originating chunk text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, String>,
}

impl VectorPoint {
    pub fn new(vector: Vec<f32>, content: impl Into<String>) -> Self {
        let mut payload = HashMap::new();
        payload.insert("content".to_string(), content.into());
        Self {
            id: Uuid::new_v4(),
            vector,
            payload,
        }
    }
}

/// A search hit. `score` is similarity under the collection's metric,
/// higher meaning more similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, String>,
}

/// Collection-oriented vector index.
///
/// `create_collection` must be idempotent: creating a collection that
/// already exists is success, never data loss. Ingestion relies on this for
/// its non-transactional check-then-create bootstrap.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool, VectorError>;

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), VectorError>;

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<(), VectorError>;

    /// Nearest-neighbor search returning up to `limit` hits with payloads,
    /// dropping hits scoring below `score_threshold` when one is given.
    async fn search(
        &self,
        name: &str,
        query: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorError>;
}
