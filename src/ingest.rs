//! One-shot ingestion: documents → chunks → embeddings → batched upserts.

use std::path::Path;
use std::thread;

use crc32fast::Hasher as Crc32;
use crossbeam_channel::bounded;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::chunker::{chunk_windows, ChunkConfig};
use crate::documents::{load_folder, Document};
use crate::embedder::{Embedder, DEFAULT_EMBEDDING_DIMENSION};
use crate::error::{ConfigError, EmbeddingError, IngestError};
use crate::vector_store::{
    upsert_in_batches, BatchFailure, IndexSpec, Metric, UpsertOutcome, VectorRecord, VectorStore,
    MAX_UPSERT_BATCH,
};

const PROGRESS_EVERY: usize = 50;

/// How chunk identifiers are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkIdStrategy {
    /// Run-local position (`"0"`, `"1"`, ...). Re-ingesting an unchanged
    /// corpus overwrites the same ids; a changed corpus may leave stale ids.
    #[default]
    Sequential,
    /// `"{crc32(document name)}-{word offset}"`, stable across runs.
    ContentAddressed,
}

/// Tunables for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Word-window parameters.
    pub chunking: ChunkConfig,
    /// Index dimension; embeddings of another length are dropped.
    pub dimension: usize,
    /// Index similarity metric.
    pub metric: Metric,
    /// Records per upsert call, at most [`MAX_UPSERT_BATCH`].
    pub batch_size: usize,
    /// Concurrent embedding workers.
    pub workers: usize,
    /// Chunk id derivation.
    pub id_strategy: ChunkIdStrategy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkConfig::default(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            metric: Metric::Cosine,
            batch_size: MAX_UPSERT_BATCH,
            workers: 1,
            id_strategy: ChunkIdStrategy::Sequential,
        }
    }
}

impl IngestConfig {
    /// Checks every setting, including the chunk window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ChunkConfig::new(self.chunking.chunk_size(), self.chunking.overlap())?;
        if self.dimension == 0 {
            return Err(ConfigError::Zero("embedding dimension"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("upsert batch size"));
        }
        if self.batch_size > MAX_UPSERT_BATCH {
            return Err(ConfigError::TooLarge {
                name: "upsert batch size",
                value: self.batch_size,
                max: MAX_UPSERT_BATCH,
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Zero("embedding workers"));
        }
        Ok(())
    }
}

/// A word window of a document with its run identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Identifier used as the vector id.
    pub id: String,
    /// Source document name.
    pub document: String,
    /// First word of the window within the document.
    pub word_offset: usize,
    /// Window text.
    pub text: String,
}

/// A chunk whose embedding call failed.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    /// Chunk id.
    pub chunk_id: String,
    /// Rendered embedding error.
    pub error: String,
}

/// Aggregate outcome of one ingestion run.
#[derive(Debug, Default, Serialize)]
pub struct IngestionReport {
    /// Documents whose text was extracted.
    pub documents_loaded: usize,
    /// Rendered load errors for skipped documents.
    pub documents_failed: Vec<String>,
    /// Chunks produced across all documents.
    pub chunks_created: usize,
    /// Embedding calls made.
    pub embeddings_attempted: usize,
    /// Embedding calls that produced a usable vector.
    pub embeddings_succeeded: usize,
    /// Chunks dropped because their embedding failed.
    pub embedding_failures: Vec<ChunkFailure>,
    /// Records written to the vector store.
    pub upserted: usize,
    /// Upsert batches that failed, retryable via [`IngestionPipeline::retry_failed`].
    #[serde(serialize_with = "serialize_batch_failures")]
    pub failed_batches: Vec<BatchFailure>,
}

impl IngestionReport {
    /// True when every chunk was embedded and every batch written.
    pub fn is_complete(&self) -> bool {
        self.embeddings_succeeded == self.chunks_created
            && self.failed_batches.is_empty()
            && self.upserted == self.embeddings_succeeded
    }
}

#[derive(Serialize)]
struct BatchFailureSummary<'a> {
    batch_index: usize,
    record_ids: Vec<&'a str>,
    error: String,
}

fn serialize_batch_failures<S: Serializer>(
    failures: &[BatchFailure],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(failures.len()))?;
    for failure in failures {
        seq.serialize_element(&BatchFailureSummary {
            batch_index: failure.batch_index,
            record_ids: failure.record_ids(),
            error: failure.error.to_string(),
        })?;
    }
    seq.end()
}

/// Turns a folder of documents into vectors in a [`VectorStore`].
pub struct IngestionPipeline<E, S> {
    embedder: E,
    store: S,
    config: IngestConfig,
}

impl<E: Embedder, S: VectorStore> IngestionPipeline<E, S> {
    /// Builds a pipeline after validating `config`.
    pub fn new(embedder: E, store: S, config: IngestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            embedder,
            store,
            config,
        })
    }

    /// Pipeline settings.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Loads every supported document in `folder` and ingests it.
    ///
    /// Fails only when the folder is unreadable, nothing loads, or the
    /// index cannot be prepared.
    pub fn ingest(&self, folder: &Path) -> Result<IngestionReport, IngestError> {
        let corpus = load_folder(folder)?;
        if corpus.documents.is_empty() {
            return Err(IngestError::NoDocuments(folder.display().to_string()));
        }
        let mut report = self.ingest_documents(corpus.documents)?;
        report.documents_failed = corpus.failures.iter().map(ToString::to_string).collect();
        Ok(report)
    }

    /// Ingests already-extracted documents.
    pub fn ingest_documents(&self, documents: Vec<Document>) -> Result<IngestionReport, IngestError> {
        if documents.is_empty() {
            return Err(IngestError::NoDocuments("the provided document set".to_string()));
        }
        let mut report = IngestionReport {
            documents_loaded: documents.len(),
            ..IngestionReport::default()
        };

        let chunks = self.chunk_documents(&documents);
        drop(documents);
        report.chunks_created = chunks.len();
        tracing::info!(chunks = chunks.len(), "chunked documents");

        let spec = IndexSpec {
            name: self.store.index_name().to_string(),
            dimension: self.config.dimension,
            metric: self.config.metric,
        };
        self.store.ensure_index(&spec)?;

        let results = self.embed_chunks(&chunks);
        report.embeddings_attempted = results.len();
        let mut records = Vec::with_capacity(chunks.len());
        for (chunk, result) in chunks.into_iter().zip(results) {
            match result {
                Ok(values) => records.push(VectorRecord::with_text(chunk.id, values, chunk.text)),
                Err(err) => {
                    tracing::warn!(chunk_id = %chunk.id, document = %chunk.document, error = %err, "dropping chunk");
                    report.embedding_failures.push(ChunkFailure {
                        chunk_id: chunk.id,
                        error: err.to_string(),
                    });
                }
            }
        }
        report.embeddings_succeeded = records.len();
        tracing::info!(
            attempted = report.embeddings_attempted,
            succeeded = report.embeddings_succeeded,
            "generated embeddings"
        );

        let outcome = upsert_in_batches(&self.store, records, self.config.batch_size);
        report.upserted = outcome.upserted;
        report.failed_batches = outcome.failures;
        tracing::info!(
            upserted = report.upserted,
            failed_batches = report.failed_batches.len(),
            "upload finished"
        );
        Ok(report)
    }

    /// Splits documents into chunks and assigns run identifiers.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            let windows = chunk_windows(&document.text, &self.config.chunking);
            tracing::debug!(document = %document.name, chunks = windows.len(), "chunked document");
            let doc_hash = name_hash(&document.name);
            for window in windows {
                let id = match self.config.id_strategy {
                    ChunkIdStrategy::Sequential => chunks.len().to_string(),
                    ChunkIdStrategy::ContentAddressed => {
                        format!("{doc_hash:08x}-{}", window.word_offset)
                    }
                };
                chunks.push(Chunk {
                    id,
                    document: document.name.clone(),
                    word_offset: window.word_offset,
                    text: window.text,
                });
            }
        }
        chunks
    }

    /// Re-sends failed batches as-is, keeping their original batch indexes.
    pub fn retry_failed(&self, failures: Vec<BatchFailure>) -> UpsertOutcome {
        let mut outcome = UpsertOutcome::default();
        for failure in failures {
            match self.store.upsert_batch(&failure.records) {
                Ok(()) => {
                    tracing::info!(batch = failure.batch_index, "retried batch succeeded");
                    outcome.upserted += failure.records.len();
                }
                Err(err) => {
                    tracing::warn!(batch = failure.batch_index, error = %err, "retried batch failed again");
                    outcome.failures.push(BatchFailure {
                        error: err.in_batch(failure.batch_index),
                        ..failure
                    });
                }
            }
        }
        outcome
    }

    /// Embeds every chunk, returning results in chunk order.
    fn embed_chunks(&self, chunks: &[Chunk]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        let total = chunks.len();
        let workers = self.config.workers.min(total).max(1);
        if workers == 1 {
            return chunks
                .iter()
                .enumerate()
                .map(|(position, chunk)| {
                    let result = self.embed_one(chunk);
                    log_progress(position + 1, total);
                    result
                })
                .collect();
        }

        let (task_tx, task_rx) = bounded::<usize>(workers * 2);
        let (result_tx, result_rx) =
            bounded::<(usize, Result<Vec<f32>, EmbeddingError>)>(workers * 2);
        thread::scope(|scope| {
            for worker_id in 0..workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for position in task_rx.iter() {
                        let result = self.embed_one(&chunks[position]);
                        if result_tx.send((position, result)).is_err() {
                            break;
                        }
                    }
                    tracing::debug!(worker_id, "embedding worker finished");
                });
            }
            drop(task_rx);
            drop(result_tx);
            scope.spawn(move || {
                for position in 0..total {
                    if task_tx.send(position).is_err() {
                        break;
                    }
                }
            });

            let mut slots: Vec<Option<Result<Vec<f32>, EmbeddingError>>> =
                (0..total).map(|_| None).collect();
            for (done, (position, result)) in result_rx.iter().enumerate() {
                slots[position] = Some(result);
                log_progress(done + 1, total);
            }
            slots
                .into_iter()
                .map(|slot| {
                    slot.unwrap_or_else(|| {
                        Err(EmbeddingError::Transport("embedding worker exited early".into()))
                    })
                })
                .collect()
        })
    }

    fn embed_one(&self, chunk: &Chunk) -> Result<Vec<f32>, EmbeddingError> {
        let values = self.embedder.embed(&chunk.text)?;
        if values.len() != self.config.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.config.dimension,
                actual: values.len(),
            });
        }
        Ok(values)
    }
}

fn name_hash(name: &str) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(name.as_bytes());
    hasher.finalize()
}

fn log_progress(done: usize, total: usize) {
    if done % PROGRESS_EVERY == 0 || done == total {
        tracing::info!(processed = done, total, "embedding progress");
    }
}
