//! Error taxonomy shared by the ingestion and answering paths.
//!
//! Per-unit failures (one document, one chunk, one upsert batch) are
//! collected into reports by the caller; run-level failures abort.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Invalid configuration detected before any processing starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Overlap must leave a positive window step.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Configured window size in words.
        chunk_size: usize,
        /// Configured overlap in words.
        overlap: usize,
    },
    /// A size or count that has to be positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    /// A value exceeded a backend limit.
    #[error("{name} of {value} exceeds the maximum of {max}")]
    TooLarge {
        /// Setting name.
        name: &'static str,
        /// Configured value.
        value: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// A required credential or identifier was blank.
    #[error("missing {0}")]
    Missing(&'static str),
    /// A credential contains bytes that cannot be sent in a header.
    #[error("{0} contains characters that are not valid in an HTTP header")]
    InvalidCredential(&'static str),
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
    /// A URL setting could not be parsed.
    #[error("invalid {name} URL '{value}': {reason}")]
    InvalidUrl {
        /// Setting name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// A single source file that could not be turned into text.
#[derive(Debug, Error)]
pub enum DocumentLoadError {
    /// The file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying io failure.
        #[source]
        source: std::io::Error,
    },
    /// The PDF parser rejected the file.
    #[error("failed to extract text from {path:?}: {reason}")]
    Extraction {
        /// File path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
    /// Extraction succeeded but produced no words.
    #[error("{0:?} contains no extractable text")]
    Empty(PathBuf),
}

/// Failure of one call to the embedding service.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Non-success HTTP status.
    #[error("embedding service returned {status}: {body}")]
    Service {
        /// Response status.
        status: StatusCode,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },
    /// The call exceeded its deadline.
    #[error("embedding request timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// Connection-level failure before a response arrived.
    #[error("embedding request failed: {0}")]
    Transport(String),
    /// The body did not match the expected schema.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
    /// The vector length does not match the index.
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        /// Index dimension.
        expected: usize,
        /// Returned vector length.
        actual: usize,
    },
}

/// Failure of an operation against the vector database.
#[derive(Debug, Error)]
#[error("vector store {operation} failed{}: {detail}", .batch.map(|b| format!(" (batch {b})")).unwrap_or_default())]
pub struct VectorStoreError {
    /// Operation name (`list_indexes`, `create_index`, `upsert`, `query`, ...).
    pub operation: &'static str,
    /// Batch index for upserts.
    pub batch: Option<usize>,
    /// Human-readable cause.
    pub detail: String,
}

impl VectorStoreError {
    /// Builds an error for a non-batched operation.
    pub fn new(operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            operation,
            batch: None,
            detail: detail.into(),
        }
    }

    /// Tags the error with the batch index that failed.
    pub fn in_batch(mut self, batch: usize) -> Self {
        self.batch = Some(batch);
        self
    }
}

/// Failure of one call to the chat-completion service.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Non-success HTTP status; the body carries the service's error detail.
    #[error("chat service returned {status}: {body}")]
    Service {
        /// Response status.
        status: StatusCode,
        /// Response body.
        body: String,
    },
    /// The call exceeded its deadline.
    #[error("chat request timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// Connection-level failure before a response arrived.
    #[error("chat request failed: {0}")]
    Transport(String),
    /// The body did not match the expected schema.
    #[error("invalid chat response: {0}")]
    InvalidResponse(String),
}

/// Conditions that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Invalid pipeline configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The source folder does not exist or cannot be listed.
    #[error("source folder {path:?} is not readable: {source}")]
    SourceFolder {
        /// Folder path.
        path: PathBuf,
        /// Underlying io failure.
        #[source]
        source: std::io::Error,
    },
    /// Every candidate document failed or the source had none.
    #[error("no documents could be loaded from {0}")]
    NoDocuments(String),
    /// Index preparation failed.
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

/// Why a retrieval produced no matches.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// The query could not be embedded.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// The similarity query failed.
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

/// Misuse of the per-conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// A question was asked while another is still awaiting its answer.
    #[error("a question is already awaiting an answer")]
    Busy,
    /// An answer was recorded with no question in flight.
    #[error("no question is awaiting an answer")]
    NotAwaiting,
}
