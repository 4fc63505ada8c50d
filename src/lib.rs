// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod chat;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod models;
pub mod node;
pub mod retrieval;
pub mod session;
pub mod vector;

// Re-export main types from each module
pub use chat::{ChatError, ChatService, NO_CONTEXT_REPLY};
pub use chunker::{ChunkerError, DocumentChunk, TextChunker};
pub use config::{ChunkingConfig, NodeConfig, RetrievalConfig};
pub use embeddings::{
    EmbeddingConfig, EmbeddingError, EmbeddingProvider, HashEmbeddings, OpenAiEmbeddings,
};
pub use ingestion::{IngestionError, IngestionPipeline};
pub use models::{
    ChatCompletion, CompletionConfig, CompletionError, ModelRegistry, OpenAiChatCompletion,
    SamplingSettings, ScriptedCompletion,
};
pub use node::{init_tracing, RagChatNode, SearchMatch};
pub use retrieval::{RetrievalError, RetrievalService, ScoredChunk};
pub use session::{ChatRole, ChatSession, ChatTurn, SessionStore, DEFAULT_SYSTEM_PROMPT};
pub use vector::{
    Distance, MemoryVectorStore, QdrantClient, ScoredPoint, VectorError, VectorPoint, VectorStore,
    VectorStoreConfig,
};
