// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Top-level wiring facade. Builds the services from a [`NodeConfig`] and
//! exposes the operations the transport layer calls into: `ask`, `rag_ask`,
//! `ingest`, `retrieve`, and `embed_text`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chat::{ChatError, ChatService};
use crate::chunker::TextChunker;
use crate::config::NodeConfig;
use crate::embeddings::{EmbeddingError, EmbeddingProvider, OpenAiEmbeddings};
use crate::ingestion::{IngestionError, IngestionPipeline};
use crate::models::{ChatCompletion, ModelRegistry, OpenAiChatCompletion};
use crate::retrieval::{RetrievalError, RetrievalService};
use crate::session::SessionStore;
use crate::vector::{QdrantClient, VectorStore};

/// Install the global tracing subscriber. Call once from the embedding
/// binary before constructing the node.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// A retrieval match as reported at the node boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: String,
    pub score: f32,
}

pub struct RagChatNode {
    chat: ChatService,
    ingestion: IngestionPipeline,
    retrieval: Arc<RetrievalService>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RagChatNode {
    /// Wire the node against live HTTP backends described by `config`.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAiEmbeddings::new(config.embedding.clone())?);
        let store: Arc<dyn VectorStore> =
            Arc::new(QdrantClient::new(config.vector_store.clone())?);

        let mut completions: Vec<Arc<dyn ChatCompletion>> = Vec::new();
        for completion_config in &config.completions {
            completions.push(Arc::new(OpenAiChatCompletion::new(
                completion_config.clone(),
            )?));
        }

        Self::with_services(config, embedder, store, completions)
    }

    /// Wire the node with caller-supplied service implementations. Tests
    /// use this with the in-memory store and deterministic embeddings.
    pub fn with_services(
        config: NodeConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        completions: Vec<Arc<dyn ChatCompletion>>,
    ) -> Result<Self> {
        let chunker = TextChunker::new(config.chunking.size, config.chunking.overlap)?;

        let ingestion = IngestionPipeline::new(
            chunker,
            Arc::clone(&embedder),
            Arc::clone(&store),
            config.collection_name.clone(),
            config.distance,
        );

        let retrieval = Arc::new(
            RetrievalService::new(
                Arc::clone(&embedder),
                Arc::clone(&store),
                config.collection_name.clone(),
            )
            .with_policy(config.retrieval.limit, config.retrieval.score_threshold),
        );

        let sessions = SessionStore::with_system_prompt(config.system_prompt.clone());
        let registry = ModelRegistry::new(completions);
        let chat = ChatService::new(registry, sessions).with_retrieval(Arc::clone(&retrieval));

        Ok(Self {
            chat,
            ingestion,
            retrieval,
            embedder,
        })
    }

    pub async fn ask(
        &self,
        user_id: &str,
        question: &str,
        model_id: &str,
    ) -> Result<String, ChatError> {
        self.chat.ask(user_id, question, model_id).await
    }

    pub async fn rag_ask(
        &self,
        user_id: &str,
        question: &str,
        model_id: &str,
    ) -> Result<String, ChatError> {
        self.chat.rag_ask(user_id, question, model_id).await
    }

    /// Ingest extracted document text. Returns the number of points written.
    pub async fn ingest(&self, text: &str) -> Result<usize, IngestionError> {
        self.ingestion.ingest(text).await
    }

    /// Search stored context, reporting id/score pairs.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchMatch>, RetrievalError> {
        let chunks = self.retrieval.retrieve(query).await?;
        Ok(chunks
            .into_iter()
            .map(|c| SearchMatch {
                id: c.id,
                score: c.score,
            })
            .collect())
    }

    /// Build the raw embedding for a text.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embedder.embed(text).await
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }
}
