mod common;

use std::time::Duration;

use pdf_rag::chat::{ChatMessage, ChatModel, ChatRequest, Role};
use pdf_rag::{ChatError, Embedder, EmbeddingError, OpenAiChat, OpenAiEmbedder};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;

use common::{Reply, StubServer};

const EMBEDDING_BODY: &str = r#"{"data":[{"index":0,"embedding":[0.5,0.25]}]}"#;
const CHAT_BODY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"Grounded."}}]}"#;

fn embedder(server: &StubServer, timeout: Duration, attempts: usize) -> OpenAiEmbedder {
    OpenAiEmbedder::new(
        "sk-test",
        &server.base_url,
        "text-embedding-3-small",
        None,
        timeout,
        attempts,
    )
    .unwrap()
}

fn chat(server: &StubServer, timeout: Duration) -> OpenAiChat {
    OpenAiChat::new("sk-test", &server.base_url, "gpt-4o-mini", timeout).unwrap()
}

fn ask(chat: &OpenAiChat) -> Result<String, ChatError> {
    let messages = vec![
        ChatMessage::new(Role::System, "rules"),
        ChatMessage::new(Role::User, "question"),
    ];
    chat.complete(&ChatRequest {
        messages: &messages,
        temperature: 0.0,
    })
}

#[test]
fn embedding_success_returns_vector() {
    let server = StubServer::start(vec![Reply::new(200, EMBEDDING_BODY)]);
    let vector = embedder(&server, Duration::from_secs(5), 1)
        .embed("hello")
        .unwrap();
    assert_eq!(vector, vec![0.5, 0.25]);
    assert_eq!(server.hits(), 1);
}

#[test]
fn embedding_server_error_is_a_service_error_without_retry_by_default() {
    let server = StubServer::start(vec![Reply::new(500, r#"{"error":"boom"}"#)]);
    let err = embedder(&server, Duration::from_secs(5), 1)
        .embed("hello")
        .unwrap_err();
    match err {
        EmbeddingError::Service { status, body } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body.contains("boom"));
        }
        other => panic!("expected service error, got {other:?}"),
    }
    assert_eq!(server.hits(), 1);
}

#[test]
fn embedding_retries_stop_after_max_attempts() {
    let server = StubServer::start(vec![Reply::new(503, "busy")]);
    let err = embedder(&server, Duration::from_secs(5), 2)
        .embed("hello")
        .unwrap_err();
    assert!(matches!(
        err,
        EmbeddingError::Service { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
    ));
    assert_eq!(server.hits(), 2);
}

#[test]
fn rate_limited_embedding_succeeds_on_retry() {
    let server = StubServer::start(vec![
        Reply::new(429, "slow down"),
        Reply::new(200, EMBEDDING_BODY),
    ]);
    let vector = embedder(&server, Duration::from_secs(5), 2)
        .embed("hello")
        .unwrap();
    assert_eq!(vector, vec![0.5, 0.25]);
    assert_eq!(server.hits(), 2);
}

#[test]
fn client_errors_are_not_retried() {
    let server = StubServer::start(vec![Reply::new(400, "bad input")]);
    let err = embedder(&server, Duration::from_secs(5), 3)
        .embed("hello")
        .unwrap_err();
    assert!(matches!(err, EmbeddingError::Service { .. }));
    assert_eq!(server.hits(), 1);
}

#[test]
fn slow_embedding_times_out_and_is_not_retried() {
    let server = StubServer::start(vec![Reply::slow(
        200,
        EMBEDDING_BODY,
        Duration::from_secs(2),
    )]);
    let timeout = Duration::from_millis(300);
    let err = embedder(&server, timeout, 3).embed("hello").unwrap_err();
    assert!(matches!(err, EmbeddingError::Timeout(t) if t == timeout));
    assert_eq!(server.hits(), 1);
}

#[test]
fn chat_success_returns_first_choice() {
    let server = StubServer::start(vec![Reply::new(200, CHAT_BODY)]);
    assert_eq!(ask(&chat(&server, Duration::from_secs(5))).unwrap(), "Grounded.");
}

#[test]
fn chat_server_error_carries_status_and_body() {
    let server = StubServer::start(vec![Reply::new(
        500,
        r#"{"error":{"message":"model overloaded"}}"#,
    )]);
    let err = ask(&chat(&server, Duration::from_secs(5))).unwrap_err();
    match &err {
        ChatError::Service { status, body } => {
            assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body.contains("model overloaded"));
        }
        other => panic!("expected service error, got {other:?}"),
    }
    assert!(err.to_string().contains("model overloaded"));
    assert_eq!(server.hits(), 1);
}

#[test]
fn slow_chat_times_out() {
    let server = StubServer::start(vec![Reply::slow(200, CHAT_BODY, Duration::from_secs(2))]);
    let timeout = Duration::from_millis(300);
    let err = ask(&chat(&server, timeout)).unwrap_err();
    assert!(matches!(err, ChatError::Timeout(t) if t == timeout));
}
