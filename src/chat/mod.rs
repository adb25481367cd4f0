//! Chat-completion seam used by the answerer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

pub mod openai;

pub use openai::OpenAiChat;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Builds a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request envelope shared by chat implementations.
pub struct ChatRequest<'a> {
    /// Ordered messages, system instruction first.
    pub messages: &'a [ChatMessage],
    /// Sampling temperature.
    pub temperature: f32,
}

/// Trait implemented by concrete chat-completion providers.
pub trait ChatModel: Send + Sync {
    /// Returns the text of the first completion choice.
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ChatError>;
}

impl<T: ChatModel + ?Sized> ChatModel for Arc<T> {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ChatError> {
        (**self).complete(request)
    }
}

impl<T: ChatModel + ?Sized> ChatModel for &T {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ChatError> {
        (**self).complete(request)
    }
}
