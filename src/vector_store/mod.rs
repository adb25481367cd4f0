//! Vector database seam: index preparation, batched upserts and top-k queries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VectorStoreError;

pub mod memory;
pub mod pinecone;

pub use memory::MemoryStore;
pub use pinecone::{PineconeStore, ServerlessSpec};

/// Largest number of records sent in one upsert call.
pub const MAX_UPSERT_BATCH: usize = 100;

/// Metadata key holding the chunk text.
pub const TEXT_KEY: &str = "text";

/// Free-form metadata stored next to each vector.
pub type Metadata = Map<String, Value>;

/// Similarity function an index is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity.
    Cosine,
    /// Negated euclidean distance.
    Euclidean,
    /// Raw dot product.
    #[serde(rename = "dotproduct")]
    DotProduct,
}

impl Metric {
    /// Scores two vectors so that larger means more similar.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => {
                let dot = dot(a, b);
                let norm = dot_self(a).sqrt() * dot_self(b).sqrt();
                if norm == 0.0 {
                    0.0
                } else {
                    dot / norm
                }
            }
            Metric::Euclidean => {
                let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                -sum.sqrt()
            }
            Metric::DotProduct => dot(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn dot_self(a: &[f32]) -> f32 {
    dot(a, a)
}

/// Desired shape of the target index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Vector dimensionality; must match the embedder output.
    pub dimension: usize,
    /// Similarity metric.
    pub metric: Metric,
}

/// A vector with its identifier and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record identifier; upserting an existing id overwrites it.
    pub id: String,
    /// Embedding values.
    pub values: Vec<f32>,
    /// Metadata; always carries [`TEXT_KEY`] for chunk records.
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Builds a chunk record whose metadata holds only the chunk text.
    pub fn with_text(id: impl Into<String>, values: Vec<f32>, text: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(TEXT_KEY.to_string(), Value::String(text.into()));
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }
}

/// One hit returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Matched record id.
    pub id: String,
    /// Similarity score; higher is closer.
    pub score: f32,
    /// Record metadata when requested.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl QueryMatch {
    /// Chunk text stored under [`TEXT_KEY`], if any.
    pub fn text(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.get(TEXT_KEY))
            .and_then(Value::as_str)
    }
}

/// Adapter over a remote (or local) vector database bound to one index.
pub trait VectorStore: Send + Sync {
    /// Name of the index this adapter reads and writes.
    fn index_name(&self) -> &str;

    /// Creates the index when absent; validates it when present.
    fn ensure_index(&self, spec: &IndexSpec) -> Result<(), VectorStoreError>;

    /// Writes one batch of at most [`MAX_UPSERT_BATCH`] records.
    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError>;

    /// Returns up to `top_k` matches, most similar first.
    ///
    /// An empty index yields an empty list, not an error.
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;
}

impl<T: VectorStore + ?Sized> VectorStore for Arc<T> {
    fn index_name(&self) -> &str {
        (**self).index_name()
    }

    fn ensure_index(&self, spec: &IndexSpec) -> Result<(), VectorStoreError> {
        (**self).ensure_index(spec)
    }

    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        (**self).upsert_batch(records)
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        (**self).query(vector, top_k, include_metadata)
    }
}

impl<T: VectorStore + ?Sized> VectorStore for &T {
    fn index_name(&self) -> &str {
        (**self).index_name()
    }

    fn ensure_index(&self, spec: &IndexSpec) -> Result<(), VectorStoreError> {
        (**self).ensure_index(spec)
    }

    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        (**self).upsert_batch(records)
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        (**self).query(vector, top_k, include_metadata)
    }
}

/// A batch that failed to upsert, kept whole so it can be retried.
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the batch within the upsert run.
    pub batch_index: usize,
    /// Records of the failed batch.
    pub records: Vec<VectorRecord>,
    /// Store error for the batch.
    pub error: VectorStoreError,
}

impl BatchFailure {
    /// Ids of the records in the failed batch.
    pub fn record_ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }
}

/// Result of a batched upsert run.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    /// Records written successfully.
    pub upserted: usize,
    /// Batches that failed, in batch order.
    pub failures: Vec<BatchFailure>,
}

/// Upserts `records` in order, `batch_size` at a time.
///
/// A failing batch is recorded and the remaining batches are still sent.
pub fn upsert_in_batches<S: VectorStore + ?Sized>(
    store: &S,
    records: Vec<VectorRecord>,
    batch_size: usize,
) -> UpsertOutcome {
    let batch_size = batch_size.clamp(1, MAX_UPSERT_BATCH);
    let total = records.len();
    let mut outcome = UpsertOutcome::default();
    let mut remaining = records.into_iter().peekable();
    let mut batch_index = 0usize;
    while remaining.peek().is_some() {
        let batch: Vec<VectorRecord> = remaining.by_ref().take(batch_size).collect();
        match store.upsert_batch(&batch) {
            Ok(()) => {
                outcome.upserted += batch.len();
                tracing::info!(
                    batch = batch_index,
                    upserted = outcome.upserted,
                    total,
                    "upserted batch"
                );
            }
            Err(err) => {
                let error = err.in_batch(batch_index);
                tracing::warn!(batch = batch_index, records = batch.len(), error = %error, "upsert batch failed");
                outcome.failures.push(BatchFailure {
                    batch_index,
                    records: batch,
                    error,
                });
            }
        }
        batch_index += 1;
    }
    outcome
}
