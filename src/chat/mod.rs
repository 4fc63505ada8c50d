// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat orchestrator: resolves the model, manages the per-user session, and
//! runs the completion — optionally augmented with retrieved context.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::models::{CompletionError, ModelRegistry};
use crate::retrieval::{RetrievalError, RetrievalService};
use crate::session::SessionStore;

/// Fixed reply used when retrieval found nothing above the score threshold.
/// Distinct from any error path: the retrieval itself succeeded.
pub const NO_CONTEXT_REPLY: &str = "I don't have context to answer that question.";

#[derive(Error, Debug)]
pub enum ChatError {
    /// Unknown model id. Client-input error; no session state is touched.
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),
    #[error("Context retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    /// `rag_ask` was called on an orchestrator built without retrieval.
    #[error("Retrieval is not configured")]
    RetrievalNotConfigured,
}

pub struct ChatService {
    registry: ModelRegistry,
    sessions: SessionStore,
    retrieval: Option<Arc<RetrievalService>>,
}

impl ChatService {
    pub fn new(registry: ModelRegistry, sessions: SessionStore) -> Self {
        Self {
            registry,
            sessions,
            retrieval: None,
        }
    }

    pub fn with_retrieval(mut self, retrieval: Arc<RetrievalService>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer `question` for `user_id` using the model bound to `model_id`.
    ///
    /// The user turn and the assistant turn of one call are appended under
    /// the session lock, so overlapping asks for the same user land as whole
    /// pairs in submission order. If the completion fails, the user turn
    /// stays recorded and no assistant turn is appended.
    pub async fn ask(
        &self,
        user_id: &str,
        question: &str,
        model_id: &str,
    ) -> Result<String, ChatError> {
        // Resolve before touching the session: an unknown model must leave
        // session state exactly as it was.
        let model = self
            .registry
            .resolve(model_id)
            .ok_or_else(|| ChatError::ModelNotFound(model_id.to_string()))?;

        let session = self.sessions.get_or_create(user_id).await;
        let mut session = session.lock().await;
        session.add_user_turn(question);

        let fragments = model
            .complete(&session.system_prompt, session.turns())
            .await?;
        let reply = fragments.concat();

        session.add_assistant_turn(reply.clone());
        info!(user_id, model_id, "Chat turn completed");
        Ok(reply)
    }

    /// RAG variant of `ask`: retrieve context for the question and submit a
    /// composed prompt as the user turn. When nothing relevant was found the
    /// fixed no-context reply is returned without calling the model.
    pub async fn rag_ask(
        &self,
        user_id: &str,
        question: &str,
        model_id: &str,
    ) -> Result<String, ChatError> {
        let retrieval = self
            .retrieval
            .as_ref()
            .ok_or(ChatError::RetrievalNotConfigured)?;

        // Fail on an unknown model before spending a retrieval round-trip.
        if self.registry.resolve(model_id).is_none() {
            return Err(ChatError::ModelNotFound(model_id.to_string()));
        }

        let chunks = retrieval.retrieve(question).await?;
        let context = match RetrievalService::build_context(&chunks) {
            Some(context) => context,
            None => {
                info!(user_id, "No context found for question");
                return Ok(NO_CONTEXT_REPLY.to_string());
            }
        };

        let prompt = compose_rag_prompt(question, &context);
        self.ask(user_id, &prompt, model_id).await
    }
}

/// Instruction prompt embedding the question and the retrieved context. The
/// model is told to answer only from the context and to admit when the
/// context does not contain the answer, rather than fabricate one.
fn compose_rag_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say \"I don't know\" \
         instead of making one up.\n\n\
         Context:\n{}\n\n\
         Question: {}",
        context, question
    )
}
