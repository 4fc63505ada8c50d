// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat orchestration tests: session lifecycle, model resolution, per-user
//! turn ordering under concurrency, and the RAG ask path end to end.

use rag_chat_node::{
    ChatCompletion, ChatError, ChatRole, ChatService, HashEmbeddings, MemoryVectorStore,
    ModelRegistry, NodeConfig, RagChatNode, ScriptedCompletion, SessionStore, NO_CONTEXT_REPLY,
};
use std::sync::Arc;

fn chat_with(models: Vec<Arc<dyn ChatCompletion>>) -> ChatService {
    ChatService::new(ModelRegistry::new(models), SessionStore::new())
}

#[tokio::test]
async fn test_sequential_asks_build_alternating_history() {
    let model = Arc::new(ScriptedCompletion::new("m1"));
    model.push_reply(vec!["hello ".to_string(), "alice".to_string()]).await;
    model.push_reply(vec!["goodbye".to_string()]).await;
    let chat = chat_with(vec![model]);

    let first = chat.ask("alice", "hi", "m1").await.unwrap();
    assert_eq!(first, "hello alice"); // fragments concatenated
    let second = chat.ask("alice", "bye", "m1").await.unwrap();
    assert_eq!(second, "goodbye");

    let session = chat.sessions().get_or_create("alice").await;
    let session = session.lock().await;
    let turns = session.turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0].role, ChatRole::User);
    assert_eq!(turns[0].text, "hi");
    assert_eq!(turns[1].role, ChatRole::Assistant);
    assert_eq!(turns[1].text, "hello alice");
    assert_eq!(turns[2].role, ChatRole::User);
    assert_eq!(turns[2].text, "bye");
    assert_eq!(turns[3].role, ChatRole::Assistant);
    assert_eq!(turns[3].text, "goodbye");
}

#[tokio::test]
async fn test_users_get_independent_sessions() {
    let chat = chat_with(vec![Arc::new(ScriptedCompletion::new("m1"))]);

    chat.ask("alice", "hi", "m1").await.unwrap();
    chat.ask("bob", "hello", "m1").await.unwrap();

    let alice = chat.sessions().get_or_create("alice").await;
    assert_eq!(alice.lock().await.turns().len(), 2);
    let bob = chat.sessions().get_or_create("bob").await;
    let bob = bob.lock().await;
    assert_eq!(bob.turns().len(), 2);
    assert_eq!(bob.turns()[0].text, "hello");
}

#[tokio::test]
async fn test_unknown_model_fails_without_touching_sessions() {
    let chat = chat_with(vec![Arc::new(ScriptedCompletion::new("m1"))]);

    let err = chat.ask("alice", "hi", "unknown-model").await.unwrap_err();
    assert!(matches!(err, ChatError::ModelNotFound(id) if id == "unknown-model"));
    assert!(!chat.sessions().contains("alice").await);
}

#[tokio::test]
async fn test_completion_failure_keeps_user_turn_only() {
    let chat = chat_with(vec![Arc::new(ScriptedCompletion::failing("m1"))]);

    let err = chat.ask("alice", "hi", "m1").await.unwrap_err();
    assert!(matches!(err, ChatError::Completion(_)));

    // History reflects "asked, no reply".
    let session = chat.sessions().get_or_create("alice").await;
    let session = session.lock().await;
    assert_eq!(session.turns().len(), 1);
    assert_eq!(session.turns()[0].role, ChatRole::User);
}

#[tokio::test]
async fn test_concurrent_same_user_asks_never_interleave_turns() {
    let chat = Arc::new(chat_with(vec![Arc::new(ScriptedCompletion::new("m1"))]));

    let mut handles = Vec::new();
    for i in 0..10 {
        let chat = Arc::clone(&chat);
        handles.push(tokio::spawn(async move {
            chat.ask("alice", &format!("message {}", i), "m1").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let session = chat.sessions().get_or_create("alice").await;
    let session = session.lock().await;
    let turns = session.turns();
    assert_eq!(turns.len(), 20);
    for pair in turns.chunks(2) {
        assert_eq!(pair[0].role, ChatRole::User);
        assert_eq!(pair[1].role, ChatRole::Assistant);
        // Each reply echoes the user turn of its own call.
        assert_eq!(pair[1].text, format!("echo: {}", pair[0].text));
    }
}

fn rag_node(models: Vec<Arc<dyn ChatCompletion>>) -> RagChatNode {
    let config = NodeConfig::default();
    RagChatNode::with_services(
        config,
        Arc::new(HashEmbeddings::new(64).unwrap()),
        Arc::new(MemoryVectorStore::new()),
        models,
    )
    .unwrap()
}

#[tokio::test]
async fn test_rag_ask_embeds_retrieved_context_into_the_prompt() {
    let model = Arc::new(ScriptedCompletion::new("m1"));
    model.push_reply(vec!["It is a language.".to_string()]).await;
    let node = rag_node(vec![model.clone()]);

    // Short document: a single chunk whose embedding matches an identical
    // query exactly, so it clears the 0.8 threshold.
    let doc = "Rust is a systems programming language.";
    node.ingest(doc).await.unwrap();

    let reply = node.rag_ask("alice", doc, "m1").await.unwrap();
    assert_eq!(reply, "It is a language.");

    // The model saw a composed prompt carrying the document text, not the
    // raw question alone.
    let calls = model.calls.lock().await;
    let last_turn = calls[0].last().unwrap();
    assert!(last_turn.text.contains("Context:"));
    assert!(last_turn.text.contains(doc));
    assert!(last_turn.text.contains("I don't know"));
}

#[tokio::test]
async fn test_rag_ask_without_context_returns_sentinel_and_skips_model() {
    let model = Arc::new(ScriptedCompletion::new("m1"));
    let node = rag_node(vec![model.clone()]);

    node.ingest("completely unrelated document text").await.unwrap();

    let reply = node
        .rag_ask("alice", "what is the capital of France?", "m1")
        .await
        .unwrap();
    assert_eq!(reply, NO_CONTEXT_REPLY);
    assert!(model.calls.lock().await.is_empty());
}

#[tokio::test]
async fn test_retrieve_boundary_reports_id_and_score() {
    let node = rag_node(vec![Arc::new(ScriptedCompletion::new("m1"))]);

    let doc = "the moon orbits the earth";
    node.ingest(doc).await.unwrap();

    let matches = node.retrieve(doc).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert!(matches[0].score > 0.99);
    assert!(!matches[0].id.is_empty());
}

#[tokio::test]
async fn test_rag_ask_with_unknown_model_fails_before_retrieval() {
    let node = rag_node(vec![Arc::new(ScriptedCompletion::new("m1"))]);
    let err = node.rag_ask("alice", "anything", "nope").await.unwrap_err();
    assert!(matches!(err, ChatError::ModelNotFound(_)));
}

#[tokio::test]
async fn test_embed_text_returns_provider_dimension() {
    let node = rag_node(vec![Arc::new(ScriptedCompletion::new("m1"))]);
    let vector = node.embed_text("some text").await.unwrap();
    assert_eq!(vector.len(), 64);
}
