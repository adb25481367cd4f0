//! Query-time retrieval: embed the question, fetch the nearest chunks.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::embedder::Embedder;
use crate::error::{ConfigError, RetrieveError};
use crate::vector_store::VectorStore;

/// Separator placed between chunk texts in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Default number of chunks fetched per question.
pub const DEFAULT_TOP_K: usize = 10;

/// Retrieval settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieverConfig {
    /// Matches requested from the store.
    pub top_k: usize,
    /// Matches scoring below this are dropped.
    pub min_score: Option<f32>,
    /// Cached query embeddings; `0` disables the cache.
    pub cache_size: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: None,
            cache_size: 0,
        }
    }
}

/// A chunk returned for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Vector id.
    pub id: String,
    /// Similarity score reported by the store.
    pub score: f32,
    /// Chunk text.
    pub text: String,
}

/// Embeds queries and fetches matching chunk text from a [`VectorStore`].
pub struct Retriever<E, S> {
    embedder: E,
    store: S,
    config: RetrieverConfig,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl<E: Embedder, S: VectorStore> Retriever<E, S> {
    /// Builds a retriever; `top_k` must be positive.
    pub fn new(embedder: E, store: S, config: RetrieverConfig) -> Result<Self, ConfigError> {
        if config.top_k == 0 {
            return Err(ConfigError::Zero("top_k"));
        }
        let cache = NonZeroUsize::new(config.cache_size).map(|cap| Mutex::new(LruCache::new(cap)));
        Ok(Self {
            embedder,
            store,
            config,
            cache,
        })
    }

    /// Retrieval settings.
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Returns the context for `query` using the configured `top_k`.
    pub fn retrieve(&self, query: &str) -> String {
        self.retrieve_top(query, self.config.top_k)
    }

    /// Returns matching chunk texts joined by blank lines, most relevant first.
    ///
    /// Every failure yields an empty string so the caller can answer with the
    /// no-information message instead of aborting the conversation.
    pub fn retrieve_top(&self, query: &str, top_k: usize) -> String {
        match self.search(query, top_k) {
            Ok(chunks) => assemble_context(&chunks),
            Err(err) => {
                tracing::warn!(error = %err, "retrieval failed; continuing without context");
                String::new()
            }
        }
    }

    /// Fetches up to `top_k` chunks in store order, propagating failures.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.query_embedding(query)?;
        let matches = self.store.query(&vector, top_k, true)?;
        let min_score = self.config.min_score;
        let chunks: Vec<RetrievedChunk> = matches
            .into_iter()
            .filter(|m| min_score.map_or(true, |min| m.score >= min))
            .filter_map(|m| {
                let text = m.text()?.to_string();
                Some(RetrievedChunk {
                    id: m.id,
                    score: m.score,
                    text,
                })
            })
            .collect();
        tracing::debug!(matches = chunks.len(), top_k, "retrieved chunks");
        Ok(chunks)
    }

    fn query_embedding(&self, query: &str) -> Result<Vec<f32>, RetrieveError> {
        let Some(cache) = &self.cache else {
            return Ok(self.embedder.embed(query)?);
        };
        if let Ok(mut guard) = cache.lock() {
            if let Some(hit) = guard.get(query) {
                return Ok(hit.clone());
            }
        }
        let vector = self.embedder.embed(query)?;
        if let Ok(mut guard) = cache.lock() {
            guard.put(query.to_string(), vector.clone());
        }
        Ok(vector)
    }
}

/// Joins chunk texts in the given order.
pub fn assemble_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
