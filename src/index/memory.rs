use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use super::{IndexError, IndexSchema, KnnQuery, VectorIndex};
use crate::document::{DocumentId, EmbeddedDocument, Hit};
use crate::vector::cosine_similarity;

/// In-process vector index with exact cosine scoring.
///
/// Scores use the same `(1 + cosine) / 2` scale as the Elasticsearch
/// `cosine` similarity so results are comparable across backends.
/// `num_candidates` has no effect since every entry is scored.
#[derive(Debug)]
pub struct MemoryVectorIndex {
    name: String,
    schema: RwLock<Option<IndexSchema>>,
    entries: DashMap<DocumentId, EmbeddedDocument>,
    requests: AtomicU64,
}

impl MemoryVectorIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: RwLock::new(None),
            entries: DashMap::new(),
            requests: AtomicU64::new(0),
        }
    }

    /// Entry stored under `id`.
    pub fn get(&self, id: DocumentId) -> Option<EmbeddedDocument> {
        self.entries.get(&id).map(|entry| entry.clone())
    }

    /// Ids of every stored entry, sorted.
    pub fn ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Number of requests served since creation.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn require_schema(&self) -> Result<IndexSchema, IndexError> {
        self.schema.read().ok_or_else(|| IndexError::MissingIndex {
            name: self.name.clone(),
        })
    }
}

impl VectorIndex for MemoryVectorIndex {
    fn schema(&self) -> Result<Option<IndexSchema>, IndexError> {
        self.record_request();
        Ok(*self.schema.read())
    }

    fn create(&self, schema: IndexSchema) -> Result<(), IndexError> {
        self.record_request();
        let mut current = self.schema.write();
        if current.is_none() {
            *current = Some(schema);
        }
        Ok(())
    }

    fn drop_index(&self) -> Result<(), IndexError> {
        self.record_request();
        *self.schema.write() = None;
        self.entries.clear();
        Ok(())
    }

    fn delete_all(&self) -> Result<u64, IndexError> {
        self.record_request();
        self.require_schema()?;
        let removed = self.entries.len() as u64;
        self.entries.clear();
        Ok(removed)
    }

    fn upsert(&self, entry: &EmbeddedDocument) -> Result<(), IndexError> {
        self.record_request();
        let schema = self.require_schema()?;
        if entry.vector.len() != schema.dims.get() {
            return Err(IndexError::Rejected {
                operation: "upsert",
                status: 400,
                body: format!(
                    "vector has {} dimensions, mapping declares {}",
                    entry.vector.len(),
                    schema.dims
                ),
            });
        }
        self.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn knn(&self, query: &KnnQuery) -> Result<Vec<Hit>, IndexError> {
        self.record_request();
        let schema = self.require_schema()?;
        if query.vector.len() != schema.dims.get() {
            return Err(IndexError::Rejected {
                operation: "knn",
                status: 400,
                body: format!(
                    "query vector has {} dimensions, mapping declares {}",
                    query.vector.len(),
                    schema.dims
                ),
            });
        }

        let mut hits: Vec<Hit> = self
            .entries
            .iter()
            .map(|entry| Hit {
                id: entry.id,
                title: entry.title.clone(),
                score: (1.0 + cosine_similarity(&query.vector, &entry.vector)) / 2.0,
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(query.k);
        Ok(hits)
    }

    fn count(&self) -> Result<u64, IndexError> {
        self.record_request();
        self.require_schema()?;
        Ok(self.entries.len() as u64)
    }
}
