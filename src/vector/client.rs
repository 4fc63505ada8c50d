// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector store implementations: a Qdrant REST client and an in-memory
//! backend used for tests and single-process deployments.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Distance, ScoredPoint, VectorError, VectorPoint, VectorStore};

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("VECTOR_DB_URL")
                .unwrap_or_else(|_| "http://localhost:6333".to_string()),
            api_key: std::env::var("VECTOR_DB_API_KEY").ok(),
            timeout_ms: 30_000,
        }
    }
}

impl Distance {
    fn as_qdrant(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Euclid => "Euclid",
            Distance::Dot => "Dot",
        }
    }
}

/// Qdrant REST client.
pub struct QdrantClient {
    config: VectorStoreConfig,
    http_client: reqwest::Client,
}

impl QdrantClient {
    pub fn new(config: VectorStoreConfig) -> Result<Self, VectorError> {
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| VectorError::Backend(format!("Invalid URL: {}", e)))?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn map_send_error(e: reqwest::Error) -> VectorError {
        if e.is_timeout() {
            VectorError::Timeout
        } else {
            VectorError::Http(e)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    async fn collection_exists(&self, name: &str) -> Result<bool, VectorError> {
        let url = format!("{}/collections/{}", self.config.base_url, name);
        let response = self
            .request(self.http_client.get(&url))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s => {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(VectorError::Backend(format!("{}: {}", s, text)))
            }
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), VectorError> {
        let url = format!("{}/collections/{}", self.config.base_url, name);
        let body = json!({
            "vectors": {
                "size": dimension,
                "distance": distance.as_qdrant(),
            }
        });
        let response = self
            .request(self.http_client.put(&url).json(&body))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if status.is_success() {
            info!(collection = name, dimension, "Collection created");
            return Ok(());
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        // Concurrent bootstrap may race; an existing collection is success.
        if status == reqwest::StatusCode::CONFLICT || text.contains("already exists") {
            debug!(collection = name, "Collection already exists");
            return Ok(());
        }
        Err(VectorError::Backend(format!("{}: {}", status, text)))
    }

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<(), VectorError> {
        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.config.base_url, name
        );
        let payload_points: Vec<Value> = points
            .iter()
            .map(|p| {
                json!({
                    "id": p.id.to_string(),
                    "vector": p.vector,
                    "payload": p.payload,
                })
            })
            .collect();
        let response = self
            .request(
                self.http_client
                    .put(&url)
                    .json(&json!({ "points": payload_points })),
            )
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VectorError::Backend(format!(
                "Upsert failed: {}: {}",
                status, text
            )));
        }
        info!(collection = name, count = points.len(), "Upserted points");
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorError> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.config.base_url, name
        );
        let mut body = json!({
            "vector": query,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(threshold) = score_threshold {
            body["score_threshold"] = json!(threshold);
        }
        let response = self
            .request(self.http_client.post(&url).json(&body))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(VectorError::CollectionNotFound(name.to_string()));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VectorError::Backend(format!(
                "Search failed: {}: {}",
                status, text
            )));
        }

        let parsed = response.json::<Value>().await?;
        let hits = parsed
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| VectorError::Backend("Malformed search response".to_string()))?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = match hit.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(VectorError::Backend(
                        "Search hit missing id".to_string(),
                    ))
                }
            };
            let score = hit
                .get("score")
                .and_then(Value::as_f64)
                .ok_or_else(|| VectorError::Backend("Search hit missing score".to_string()))?
                as f32;
            let mut payload = HashMap::new();
            if let Some(Value::Object(map)) = hit.get("payload") {
                for (key, value) in map {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    payload.insert(key.clone(), text);
                }
            }
            results.push(ScoredPoint { id, score, payload });
        }
        Ok(results)
    }
}

struct MemoryCollection {
    dimension: usize,
    distance: Distance,
    points: HashMap<String, VectorPoint>,
}

/// In-memory vector store with exact scoring. Collections live in a shared
/// map behind an async RwLock, so readers of distinct collections do not
/// block one another.
#[derive(Clone, Default)]
pub struct MemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, MemoryCollection>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points currently stored in a collection.
    pub async fn point_count(&self, name: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(name).map_or(0, |c| c.points.len())
    }

    fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
        match distance {
            Distance::Cosine => cosine_similarity(a, b),
            Distance::Dot => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            // Negated so that higher still means closer.
            Distance::Euclid => {
                -a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt()
            }
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, VectorError> {
        let collections = self.collections.read().await;
        Ok(collections.contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), VectorError> {
        let mut collections = self.collections.write().await;
        // Duplicate create keeps the existing collection and its points.
        collections
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection {
                dimension,
                distance,
                points: HashMap::new(),
            });
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<(), VectorError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| VectorError::CollectionNotFound(name.to_string()))?;
        for point in &points {
            if point.vector.len() != collection.dimension {
                return Err(VectorError::Dimension {
                    expected: collection.dimension,
                    actual: point.vector.len(),
                });
            }
        }
        for point in points {
            collection.points.insert(point.id.to_string(), point);
        }
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| VectorError::CollectionNotFound(name.to_string()))?;
        if query.len() != collection.dimension {
            return Err(VectorError::Dimension {
                expected: collection.dimension,
                actual: query.len(),
            });
        }

        let mut results: Vec<ScoredPoint> = collection
            .points
            .values()
            .map(|point| ScoredPoint {
                id: point.id.to_string(),
                score: Self::score(collection.distance, &query, &point.vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| score_threshold.map_or(true, |t| hit.score >= t))
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_collection_is_idempotent() {
        let store = MemoryVectorStore::new();
        store
            .create_collection("docs", 3, Distance::Cosine)
            .await
            .unwrap();
        store
            .upsert("docs", vec![VectorPoint::new(vec![1.0, 0.0, 0.0], "a")])
            .await
            .unwrap();

        // A second create must not drop the existing points.
        store
            .create_collection("docs", 3, Distance::Cosine)
            .await
            .unwrap();
        assert_eq!(store.point_count("docs").await, 1);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = MemoryVectorStore::new();
        store
            .create_collection("docs", 3, Distance::Cosine)
            .await
            .unwrap();
        let err = store
            .upsert("docs", vec![VectorPoint::new(vec![1.0, 0.0], "short")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Dimension { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let store = MemoryVectorStore::new();
        let err = store
            .upsert("missing", vec![VectorPoint::new(vec![1.0], "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn search_orders_by_score_and_applies_threshold() {
        let store = MemoryVectorStore::new();
        store
            .create_collection("docs", 2, Distance::Cosine)
            .await
            .unwrap();
        store
            .upsert(
                "docs",
                vec![
                    VectorPoint::new(vec![1.0, 0.0], "exact"),
                    VectorPoint::new(vec![0.9, 0.1], "close"),
                    VectorPoint::new(vec![0.0, 1.0], "orthogonal"),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .search("docs", vec![1.0, 0.0], 10, Some(0.5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].payload.get("content").unwrap(), "exact");
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
