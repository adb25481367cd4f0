#![warn(missing_docs)]
//! Retrieval-augmented question answering over a folder of documents.
//!
//! Ingestion chunks and embeds documents into a vector index; answering
//! embeds the question, retrieves the nearest chunks and asks a chat model to
//! answer from them, carrying the conversation history along.

pub mod answer;
pub mod chat;
pub mod chunker;
pub mod config;
pub mod conversation;
pub mod documents;
pub mod embedder;
pub mod error;
mod http;
pub mod ingest;
pub mod retriever;
pub mod telemetry;
pub mod vector_store;

pub use answer::{AnswerConfig, AnswerResult, Answerer, NO_CONTEXT_MESSAGE};
pub use chat::{ChatMessage, ChatModel, ChatRequest, OpenAiChat, Role};
pub use chunker::{chunk_text, ChunkConfig};
pub use conversation::{Conversation, ConversationState, ConversationTurn, TurnRole};
pub use documents::{load_folder, Document, LoadedCorpus};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use error::{
    ChatError, ConfigError, ConversationError, DocumentLoadError, EmbeddingError, IngestError,
    RetrieveError, VectorStoreError,
};
pub use ingest::{ChunkIdStrategy, IngestConfig, IngestionPipeline, IngestionReport};
pub use retriever::{Retriever, RetrieverConfig};
pub use vector_store::{
    IndexSpec, MemoryStore, Metric, PineconeStore, QueryMatch, VectorRecord, VectorStore,
};
