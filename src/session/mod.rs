// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-user chat session state.
//!
//! Sessions are process-lifetime, in-memory only. Each session sits behind
//! its own `Mutex` so turn appends for one user serialize, while distinct
//! users never contend with each other beyond the brief map lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly helper.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Ordered conversation history for one user. Turns are only ever appended;
/// the system prompt is fixed at creation.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub user_id: String,
    pub system_prompt: String,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(user_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            system_prompt: system_prompt.into(),
            turns: Vec::new(),
        }
    }

    pub fn add_user_turn(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: ChatRole::User,
            text: text.into(),
        });
    }

    pub fn add_assistant_turn(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: ChatRole::Assistant,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }
}

/// Maps user id to its session. `get_or_create` never fails; a missing
/// session is created with the default system prompt.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<ChatSession>>>>>,
    system_prompt: Arc<String>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_system_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            system_prompt: Arc::new(system_prompt.into()),
        }
    }

    /// Fetch the session for `user_id`, creating it on first use. The
    /// returned handle owns the per-user lock; callers hold it across a full
    /// ask so two overlapping asks for one user cannot interleave turns.
    pub async fn get_or_create(&self, user_id: &str) -> Arc<Mutex<ChatSession>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(user_id) {
                return Arc::clone(session);
            }
        }
        let mut sessions = self.sessions.write().await;
        // Another task may have created it between the read and write lock.
        Arc::clone(sessions.entry(user_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(ChatSession::new(
                user_id,
                self.system_prompt.as_str(),
            )))
        }))
    }

    /// Whether a session exists without creating one.
    pub async fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
