//! OpenAI chat-completions client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel, ChatRequest};
use crate::error::{ChatError, ConfigError};
use crate::http;

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChat {
    endpoint: String,
    model: String,
    timeout: Duration,
    client: Client,
}

impl OpenAiChat {
    /// Builds a client bound to one chat model.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("OpenAI API key"));
        }
        if model.trim().is_empty() {
            return Err(ConfigError::Missing("OpenAI chat model"));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ConfigError::InvalidCredential("OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            endpoint: http::endpoint("OpenAI base", base_url, "chat/completions")?,
            model: model.trim().to_string(),
            timeout,
            client,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ChatError {
        if err.is_timeout() {
            ChatError::Timeout(self.timeout)
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

impl ChatModel for OpenAiChat {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ChatError> {
        let body = CompletionRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: request.messages,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|err| self.transport_error(err))?;
        let status = resp.status();
        let text = resp.text().map_err(|err| self.transport_error(err))?;
        if !status.is_success() {
            return Err(ChatError::Service { status, body: text });
        }
        parse_chat_response(&text)
    }
}

/// Validates a completion body and returns the first choice's content.
pub fn parse_chat_response(body: &str) -> Result<String, ChatError> {
    let parsed: CompletionResponse =
        serde_json::from_str(body).map_err(|err| ChatError::InvalidResponse(err.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::InvalidResponse("response has no choices".into()))?;
    choice
        .message
        .content
        .ok_or_else(|| ChatError::InvalidResponse("first choice has no text content".into()))
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
