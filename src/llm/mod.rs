//! Language-model clients used by the generation and review stages.
//!
//! Stages talk to a [`LanguageModel`] so tests can substitute scripted
//! responses for the hosted API.

mod anthropic;

pub use anthropic::AnthropicClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A request for one model completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Optional system instructions.
    pub system: Option<String>,
    /// Conversation so far; must end with a user message.
    pub messages: Vec<Message>,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Creates a single-turn request with the given system instructions.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            messages: vec![Message::user(user)],
            max_tokens: 4096,
            temperature: 0.1,
        }
    }

    /// Creates a single-turn request without system instructions.
    pub fn user_only(user: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![Message::user(user)],
            max_tokens: 4096,
            temperature: 0.1,
        }
    }

    /// Sets sampling parameters.
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

/// A hosted language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends the request and returns the model's text response.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Identifier of the model this client talks to.
    fn model(&self) -> &str;
}
