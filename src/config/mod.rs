// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration. Defaults mirror the deployment this node was tuned
//! for: 500/50 chunk windows, top-50 search at a 0.8 similarity threshold,
//! 1536-dimensional cosine collections.

use crate::embeddings::EmbeddingConfig;
use crate::models::CompletionConfig;
use crate::session::DEFAULT_SYSTEM_PROMPT;
use crate::vector::{Distance, VectorStoreConfig};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: 500,
            overlap: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub limit: usize,
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            score_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub collection_name: String,
    pub distance: Distance,
    pub system_prompt: String,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    /// One completion binding per model the node serves. Later entries win
    /// on duplicate model ids.
    pub completions: Vec<CompletionConfig>,
}

impl NodeConfig {
    /// Load `.env` (if present) and build the config from the environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::default()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            collection_name: std::env::var("VECTOR_COLLECTION")
                .unwrap_or_else(|_| "documents".to_string()),
            distance: Distance::Cosine,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            completions: vec![CompletionConfig::default()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_policy() {
        let config = NodeConfig::default();
        assert_eq!(config.chunking.size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.limit, 50);
        assert!((config.retrieval.score_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.distance, Distance::Cosine);
        assert_eq!(config.embedding.dimension, 1536);
    }
}
