#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pdf_rag::chat::{ChatModel, ChatRequest};
use pdf_rag::vector_store::{IndexSpec, MemoryStore, QueryMatch, VectorRecord, VectorStore};
use pdf_rag::{ChatError, Embedder, EmbeddingError, Metric, VectorStoreError};
use reqwest::StatusCode;

pub const DIMENSION: usize = 4;

/// Counts a few keywords so related texts land near each other.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub fail_marker: Option<&'static str>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_marker: None,
        }
    }

    pub fn failing_on(marker: &'static str) -> Self {
        Self {
            fail_marker: Some(marker),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = self.fail_marker {
            if text.contains(marker) {
                return Err(EmbeddingError::Service {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: r#"{"error":{"message":"upstream failure"}}"#.into(),
                });
            }
        }
        let count = |word: &str| text.split_whitespace().filter(|w| w.contains(word)).count() as f32;
        Ok(vec![count("fox"), count("cat"), count("pdf"), 1.0])
    }
}

/// Chat double that records request sizes.
pub struct CountingChat {
    pub reply: Result<String, ChatError>,
    pub requests: Mutex<Vec<usize>>,
}

impl CountingChat {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err(ChatError::Transport("connection refused".into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn message_counts(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatModel for CountingChat {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ChatError> {
        self.requests.lock().unwrap().push(request.messages.len());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(ChatError::Transport(detail)) => Err(ChatError::Transport(detail.clone())),
            Err(_) => Err(ChatError::InvalidResponse("unexpected".into())),
        }
    }
}

/// Wraps a [`MemoryStore`] and rejects the upsert calls listed in `fail_calls`.
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_calls: Vec<usize>,
    pub upsert_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(name: &str, fail_calls: Vec<usize>) -> Self {
        Self {
            inner: MemoryStore::new(name),
            fail_calls,
            upsert_calls: AtomicUsize::new(0),
        }
    }
}

impl VectorStore for FlakyStore {
    fn index_name(&self) -> &str {
        self.inner.index_name()
    }

    fn ensure_index(&self, spec: &IndexSpec) -> Result<(), VectorStoreError> {
        self.inner.ensure_index(spec)
    }

    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return Err(VectorStoreError::new("upsert", "503 service unavailable"));
        }
        self.inner.upsert_batch(records)
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        self.inner.query(vector, top_k, include_metadata)
    }
}

pub fn words(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("{prefix}{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn index_spec(name: &str) -> IndexSpec {
    IndexSpec {
        name: name.to_string(),
        dimension: DIMENSION,
        metric: Metric::Cosine,
    }
}

/// One scripted HTTP reply.
#[derive(Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(status: u16, body: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(status, body)
        }
    }
}

/// Local HTTP/1.1 server answering each connection with the next scripted
/// reply; the last reply repeats once the script runs out.
pub struct StubServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub fn start(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let call = counter.fetch_add(1, Ordering::SeqCst);
                let reply = script[call.min(script.len() - 1)].clone();
                read_request(&mut stream);
                thread::sleep(reply.delay);
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    reply.body.len(),
                    reply.body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Self { base_url, hits }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn read_request(stream: &mut std::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let Ok(n) = stream.read(&mut chunk) else { return };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + length {
            return;
        }
    }
}
