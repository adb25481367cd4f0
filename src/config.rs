//! Command-line and environment settings shared by the binaries.
//!
//! Each group is a `clap::Args` struct flattened into a binary's parser; every
//! value can also come from the environment (and from a `.env` file, which
//! the binaries load before parsing).

use std::time::Duration;

use clap::{ArgAction, Args, ValueEnum};

use crate::answer::AnswerConfig;
use crate::chat::OpenAiChat;
use crate::chunker::{ChunkConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embedder::{OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSION};
use crate::error::ConfigError;
use crate::ingest::ChunkIdStrategy;
use crate::retriever::{RetrieverConfig, DEFAULT_TOP_K};
use crate::vector_store::{PineconeStore, ServerlessSpec};

/// OpenAI credentials and embedding settings.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI API key used for embeddings and chat
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Base URL for the OpenAI-compatible API
    #[arg(
        long,
        env = "PDF_RAG_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(
        long,
        env = "PDF_RAG_EMBED_MODEL",
        default_value = "text-embedding-3-small"
    )]
    pub embedding_model: String,

    /// Optional dimension override when supported by the model
    #[arg(long, env = "PDF_RAG_EMBED_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "PDF_RAG_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    pub embed_timeout_secs: u64,

    /// Attempts per embedding call for rate limits or server errors (1 = no retry)
    #[arg(long, env = "PDF_RAG_EMBED_MAX_RETRIES", default_value_t = 1)]
    pub embed_max_retries: usize,
}

impl OpenAiArgs {
    /// Dimension the index is created with.
    pub fn index_dimension(&self) -> usize {
        self.embedding_dimensions
            .unwrap_or(DEFAULT_EMBEDDING_DIMENSION)
    }

    /// Builds the embedding client.
    pub fn embedder(&self) -> Result<OpenAiEmbedder, ConfigError> {
        if self.embed_timeout_secs == 0 {
            return Err(ConfigError::Zero("embedding timeout"));
        }
        OpenAiEmbedder::new(
            &self.openai_api_key,
            &self.openai_base_url,
            &self.embedding_model,
            self.embedding_dimensions,
            Duration::from_secs(self.embed_timeout_secs),
            self.embed_max_retries,
        )
    }
}

/// Chat-completion settings.
#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Chat model used to write answers
    #[arg(long, env = "PDF_RAG_CHAT_MODEL", default_value = "gpt-4o-mini")]
    pub chat_model: String,

    /// Max seconds to wait for each chat completion
    #[arg(long, env = "PDF_RAG_CHAT_TIMEOUT_SECS", default_value_t = 60)]
    pub chat_timeout_secs: u64,

    /// Sampling temperature for the answer model
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Number of chunks retrieved per question
    #[arg(long, env = "PDF_RAG_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Drop matches scoring below this similarity
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Cached query embeddings kept in memory (0 disables caching)
    #[arg(long, default_value_t = 128)]
    pub embedding_cache_size: usize,

    /// Send only the most recent N turns of history with each question
    #[arg(long, env = "PDF_RAG_MAX_HISTORY_TURNS")]
    pub max_history_turns: Option<usize>,
}

impl ChatArgs {
    /// Builds the chat client, reusing the OpenAI credentials.
    pub fn chat(&self, openai: &OpenAiArgs) -> Result<OpenAiChat, ConfigError> {
        if self.chat_timeout_secs == 0 {
            return Err(ConfigError::Zero("chat timeout"));
        }
        OpenAiChat::new(
            &openai.openai_api_key,
            &openai.openai_base_url,
            &self.chat_model,
            Duration::from_secs(self.chat_timeout_secs),
        )
    }

    /// Retrieval settings.
    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            top_k: self.top_k,
            min_score: self.min_score,
            cache_size: self.embedding_cache_size,
        }
    }

    /// Answer settings.
    pub fn answer_config(&self) -> AnswerConfig {
        AnswerConfig {
            temperature: self.temperature,
            ..AnswerConfig::default()
        }
    }
}

/// Pinecone project and index settings.
#[derive(Args, Debug, Clone)]
pub struct PineconeArgs {
    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pub pinecone_api_key: String,

    /// Index that stores the document chunks
    #[arg(long, env = "PDF_RAG_INDEX", default_value = "myind")]
    pub index: String,

    /// Cloud used when the index has to be created
    #[arg(long, env = "PDF_RAG_PINECONE_CLOUD", default_value = "aws")]
    pub pinecone_cloud: String,

    /// Region used when the index has to be created
    #[arg(long, env = "PDF_RAG_PINECONE_REGION", default_value = "us-east-1")]
    pub pinecone_region: String,

    /// Pinecone control-plane URL
    #[arg(
        long,
        env = "PDF_RAG_PINECONE_CONTROL_URL",
        default_value = "https://api.pinecone.io"
    )]
    pub pinecone_control_url: String,

    /// Max seconds to wait for each Pinecone request
    #[arg(long, default_value_t = 30)]
    pub pinecone_timeout_secs: u64,

    /// Max seconds to wait for a newly created index to become ready
    #[arg(long, default_value_t = 120)]
    pub index_ready_timeout_secs: u64,
}

impl PineconeArgs {
    /// Builds the vector store adapter (no network traffic yet).
    pub fn store(&self) -> Result<PineconeStore, ConfigError> {
        if self.pinecone_timeout_secs == 0 {
            return Err(ConfigError::Zero("Pinecone timeout"));
        }
        PineconeStore::new(
            &self.pinecone_api_key,
            &self.pinecone_control_url,
            &self.index,
            ServerlessSpec {
                cloud: self.pinecone_cloud.clone(),
                region: self.pinecone_region.clone(),
            },
            Duration::from_secs(self.pinecone_timeout_secs),
            Duration::from_secs(self.index_ready_timeout_secs),
        )
    }
}

/// Chunk id derivation selectable on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategyArg {
    /// Run-local sequential ids ("0", "1", ...)
    Sequential,
    /// Ids derived from document name and word offset
    Content,
}

impl From<IdStrategyArg> for ChunkIdStrategy {
    fn from(arg: IdStrategyArg) -> Self {
        match arg {
            IdStrategyArg::Sequential => ChunkIdStrategy::Sequential,
            IdStrategyArg::Content => ChunkIdStrategy::ContentAddressed,
        }
    }
}

/// Word-window settings.
#[derive(Args, Debug, Clone)]
pub struct ChunkArgs {
    /// Words per chunk
    #[arg(long, env = "PDF_RAG_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks (must be smaller than --chunk-size)
    #[arg(long, env = "PDF_RAG_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,
}

impl ChunkArgs {
    /// Validated chunk configuration.
    pub fn chunk_config(&self) -> Result<ChunkConfig, ConfigError> {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap)
    }
}

/// Log verbosity flags.
#[derive(Args, Debug, Clone, Copy)]
pub struct LogArgs {
    /// Increase log detail (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        chunks: ChunkArgs,
        #[command(flatten)]
        chat: ChatArgs,
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = TestCli::try_parse_from(["test"]).unwrap();
        let config = cli.chunks.chunk_config().unwrap();
        assert_eq!(config.chunk_size(), 500);
        assert_eq!(config.overlap(), 100);
        assert_eq!(cli.chat.top_k, 10);
        assert_eq!(cli.chat.answer_config().temperature, 0.0);
        assert_eq!(cli.chat.chat_timeout_secs, 60);
    }

    #[test]
    fn invalid_overlap_is_reported_before_any_work() {
        let cli = TestCli::try_parse_from(["test", "--chunk-size", "50", "--chunk-overlap", "50"])
            .unwrap();
        assert!(matches!(
            cli.chunks.chunk_config(),
            Err(ConfigError::OverlapTooLarge { .. })
        ));
    }
}
