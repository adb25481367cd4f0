//! In-process vector store with exhaustive scoring.
//!
//! Useful for tests and small offline corpora; every query scores every record.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{IndexSpec, QueryMatch, VectorRecord, VectorStore, MAX_UPSERT_BATCH};
use crate::error::VectorStoreError;

#[derive(Default)]
struct MemoryIndex {
    spec: Option<IndexSpec>,
    records: BTreeMap<String, VectorRecord>,
}

/// Vector store that keeps one index in memory.
pub struct MemoryStore {
    name: String,
    index: RwLock<MemoryIndex>,
}

impl MemoryStore {
    /// Creates an empty store for the named index.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: RwLock::new(MemoryIndex::default()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.index.read().map(|index| index.records.len()).unwrap_or(0)
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a stored record by id.
    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.index
            .read()
            .ok()
            .and_then(|index| index.records.get(id).cloned())
    }
}

fn poisoned(operation: &'static str) -> VectorStoreError {
    VectorStoreError::new(operation, "memory index lock poisoned")
}

impl VectorStore for MemoryStore {
    fn index_name(&self) -> &str {
        &self.name
    }

    fn ensure_index(&self, spec: &IndexSpec) -> Result<(), VectorStoreError> {
        if spec.name != self.name {
            return Err(VectorStoreError::new(
                "ensure_index",
                format!("store is bound to index '{}', not '{}'", self.name, spec.name),
            ));
        }
        let mut index = self.index.write().map_err(|_| poisoned("ensure_index"))?;
        match &index.spec {
            None => {
                index.spec = Some(spec.clone());
                Ok(())
            }
            Some(existing) if existing.dimension != spec.dimension => Err(VectorStoreError::new(
                "ensure_index",
                format!(
                    "index '{}' has dimension {}, expected {}",
                    spec.name, existing.dimension, spec.dimension
                ),
            )),
            Some(existing) if existing.metric != spec.metric => Err(VectorStoreError::new(
                "ensure_index",
                format!(
                    "index '{}' uses metric {:?}, expected {:?}",
                    spec.name, existing.metric, spec.metric
                ),
            )),
            Some(_) => Ok(()),
        }
    }

    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        if records.len() > MAX_UPSERT_BATCH {
            return Err(VectorStoreError::new(
                "upsert",
                format!("batch of {} exceeds {}", records.len(), MAX_UPSERT_BATCH),
            ));
        }
        let mut index = self.index.write().map_err(|_| poisoned("upsert"))?;
        let dimension = index
            .spec
            .as_ref()
            .map(|spec| spec.dimension)
            .ok_or_else(|| {
                VectorStoreError::new("upsert", format!("index '{}' does not exist", self.name))
            })?;
        if let Some(bad) = records.iter().find(|r| r.values.len() != dimension) {
            return Err(VectorStoreError::new(
                "upsert",
                format!(
                    "record '{}' has {} dimensions, index expects {}",
                    bad.id,
                    bad.values.len(),
                    dimension
                ),
            ));
        }
        for record in records {
            index.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let index = self.index.read().map_err(|_| poisoned("query"))?;
        let Some(spec) = index.spec.as_ref() else {
            return Ok(Vec::new());
        };
        if vector.len() != spec.dimension {
            return Err(VectorStoreError::new(
                "query",
                format!(
                    "query vector has {} dimensions, index expects {}",
                    vector.len(),
                    spec.dimension
                ),
            ));
        }
        let mut matches: Vec<QueryMatch> = index
            .records
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: spec.metric.score(vector, &record.values),
                metadata: include_metadata.then(|| record.metadata.clone()),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}
