//! OpenAI-based embedding client implementation.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::error::{ConfigError, EmbeddingError};
use crate::http;

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    timeout: Duration,
    max_retries: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    ///
    /// `max_retries` counts total attempts; `1` disables retrying.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimensions: Option<usize>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("OpenAI API key"));
        }
        if model.trim().is_empty() {
            return Err(ConfigError::Missing("OpenAI embedding model"));
        }
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        let auth = HeaderValue::from_str(&auth)
            .map_err(|_| ConfigError::InvalidCredential("OpenAI API key"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        let endpoint = http::endpoint("OpenAI base", base_url, "embeddings")?;
        Ok(Self {
            client,
            endpoint,
            model: model.trim().to_string(),
            dimensions,
            timeout,
            max_retries: max_retries.max(1),
        })
    }

    /// Model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn should_retry(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn retry_backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(500 * (1 << capped))
    }

    fn transport_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout(self.timeout)
        } else {
            EmbeddingError::Transport(err.to_string())
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
        };
        let mut attempt = 0usize;
        loop {
            let response = self.client.post(&self.endpoint).json(&request).send();
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().map_err(|err| self.transport_error(err))?;
                    if status.is_success() {
                        return parse_embedding_response(&body);
                    }
                    if self.should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::debug!(%status, attempt, "retrying embedding request");
                        thread::sleep(self.retry_backoff(attempt));
                        continue;
                    }
                    return Err(EmbeddingError::Service { status, body });
                }
                Err(err) => {
                    if err.is_connect() && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::debug!(error = %err, attempt, "retrying embedding request");
                        thread::sleep(self.retry_backoff(attempt));
                        continue;
                    }
                    return Err(self.transport_error(err));
                }
            }
        }
    }
}

/// Validates an embeddings response body and extracts the first vector.
pub fn parse_embedding_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|err| EmbeddingError::InvalidResponse(err.to_string()))?;
    let mut data = parsed.data;
    data.sort_by_key(|entry| entry.index);
    let first = data
        .into_iter()
        .next()
        .ok_or_else(|| EmbeddingError::InvalidResponse("response has no data entries".into()))?;
    if first.embedding.is_empty() {
        return Err(EmbeddingError::InvalidResponse(
            "response contains an empty embedding".into(),
        ));
    }
    Ok(first.embedding)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_embedding() {
        let body = r#"{
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.25, -0.5, 1.0]}],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let vector = parse_embedding_response(body).expect("valid body");
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn missing_data_is_a_typed_error() {
        let err = parse_embedding_response(r#"{"data": []}"#).unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));

        let err = parse_embedding_response(r#"{"error": {"message": "nope"}}"#).unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[test]
    fn rejects_blank_credentials() {
        let result = OpenAiEmbedder::new(
            "  ",
            "https://api.openai.com/v1",
            "text-embedding-3-small",
            None,
            Duration::from_secs(30),
            1,
        );
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn request_omits_unset_dimensions() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: "hello",
            dimensions: None,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"model": "text-embedding-3-small", "input": "hello"})
        );
    }
}
