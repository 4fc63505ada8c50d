// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Completion capabilities and the model registry that dispatches to them.
//!
//! Each capability is bound to one model id. The registry is built once at
//! startup and immutable afterwards; lookups resolve a model id to its
//! capability or fail with an unknown-model error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::session::{ChatRole, ChatTurn};

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Completion request timed out")]
    Timeout,
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Malformed provider response: {0}")]
    Decode(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A chat completion capability bound to a single model id.
///
/// `complete` receives the full conversation (system prompt plus ordered
/// turns) and returns the reply as an ordered list of message fragments;
/// the caller concatenates them into one reply string.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<Vec<String>, CompletionError>;
}

/// Maps model id to its completion capability. Populated once from an
/// ordered list; a duplicate id keeps the later binding.
pub struct ModelRegistry {
    bindings: HashMap<String, Arc<dyn ChatCompletion>>,
}

impl ModelRegistry {
    pub fn new(services: Vec<Arc<dyn ChatCompletion>>) -> Self {
        let mut bindings = HashMap::new();
        for service in services {
            bindings.insert(service.model_id().to_string(), service);
        }
        Self { bindings }
    }

    pub fn resolve(&self, model_id: &str) -> Option<Arc<dyn ChatCompletion>> {
        self.bindings.get(model_id).map(Arc::clone)
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Sampling settings forwarded with every completion request.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingSettings {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub sampling: SamplingSettings,
    pub timeout_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("COMPLETION_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("COMPLETION_API_KEY").ok(),
            model: std::env::var("COMPLETION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            sampling: SamplingSettings::default(),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiChatCompletion {
    config: CompletionConfig,
    http_client: reqwest::Client,
}

impl OpenAiChatCompletion {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        if config.model.is_empty() {
            return Err(CompletionError::InvalidConfig(
                "Model id must not be empty".to_string(),
            ));
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatCompletion {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<Vec<String>, CompletionError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: system_prompt,
        });
        for turn in turns {
            messages.push(WireMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: &turn.text,
            });
        }

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.sampling.temperature,
            top_p: self.config.sampling.top_p,
        };

        let url = format!("{}/chat/completions", self.config.api_base);
        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::Provider(format!("{}: {}", status, text)));
        }

        let parsed = response.json::<ChatCompletionResponse>().await?;
        if parsed.choices.is_empty() {
            return Err(CompletionError::Decode(
                "Completion response carried no choices".to_string(),
            ));
        }
        let fragments: Vec<String> = parsed
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect();
        debug!(model = %self.config.model, fragments = fragments.len(), "Completion received");
        Ok(fragments)
    }
}

/// Test double that replays queued replies, falling back to echoing the last
/// user turn. Records every history it was invoked with.
pub struct ScriptedCompletion {
    model: String,
    replies: Mutex<Vec<Vec<String>>>,
    pub calls: Mutex<Vec<Vec<ChatTurn>>>,
    fail: bool,
}

impl ScriptedCompletion {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            replies: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            replies: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Queue a reply; each call to `complete` consumes one queued reply
    /// (front first) before the echo fallback kicks in.
    pub async fn push_reply(&self, fragments: Vec<String>) {
        self.replies.lock().await.push(fragments);
    }
}

#[async_trait]
impl ChatCompletion for ScriptedCompletion {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<Vec<String>, CompletionError> {
        self.calls.lock().await.push(turns.to_vec());
        if self.fail {
            return Err(CompletionError::Provider(
                "scripted failure".to_string(),
            ));
        }
        let mut replies = self.replies.lock().await;
        if replies.is_empty() {
            let last = turns
                .last()
                .map(|t| t.text.clone())
                .unwrap_or_default();
            Ok(vec![format!("echo: {}", last)])
        } else {
            Ok(replies.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(id: &str) -> Arc<dyn ChatCompletion> {
        Arc::new(ScriptedCompletion::new(id))
    }

    #[test]
    fn registry_resolves_known_models() {
        let registry = ModelRegistry::new(vec![binding("m1"), binding("m2")]);
        assert!(registry.resolve("m1").is_some());
        assert!(registry.resolve("m2").is_some());
        assert!(registry.resolve("m3").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_model_ids_keep_the_later_binding() {
        let first = Arc::new(ScriptedCompletion::new("m1"));
        first.push_reply(vec!["first".to_string()]).await;
        let second = Arc::new(ScriptedCompletion::new("m1"));
        second.push_reply(vec!["second".to_string()]).await;

        let bindings: Vec<Arc<dyn ChatCompletion>> = vec![first, second];
        let registry = ModelRegistry::new(bindings);
        assert_eq!(registry.len(), 1);

        let resolved = registry.resolve("m1").unwrap();
        let reply = resolved.complete("sys", &[]).await.unwrap();
        assert_eq!(reply, vec!["second".to_string()]);
    }

    #[tokio::test]
    async fn scripted_completion_echoes_without_queued_replies() {
        let model = ScriptedCompletion::new("m1");
        let turns = vec![ChatTurn {
            role: ChatRole::User,
            text: "hello".to_string(),
        }];
        let reply = model.complete("sys", &turns).await.unwrap();
        assert_eq!(reply, vec!["echo: hello".to_string()]);
    }
}
