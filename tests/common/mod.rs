//! Shared fixtures for integration tests: in-memory backends wired into a
//! pipeline context, plus index wrappers that fail or block on demand.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use artvec::corpus::MemoryCorpus;
use artvec::index::{IndexSchema, KnnQuery, MemoryVectorIndex};
use artvec::models::MemoryModelStore;
use artvec::query::MemoryProfileStore;
use artvec::vector::{TfidfParams, VectorizeParams};
use artvec::{
    Document, DocumentId, EmbeddedDocument, Hit, IndexError, IndexPipeline, PipelineContext,
    VectorIndex,
};
use chrono::{TimeZone, Utc};
use crossbeam_channel::{Receiver, Sender, bounded};

pub fn article(id: i64, title: &str, body: &str) -> Document {
    Document {
        id: DocumentId::new(id),
        title: title.to_string(),
        body: body.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::hours(id),
        indexed: false,
    }
}

/// Five football articles sharing enough terms to survive `min_df = 1`.
pub fn football_articles() -> Vec<Document> {
    vec![
        article(1, "Derby day", "The derby ended with a late goal from the striker"),
        article(2, "Cup final", "A penalty shootout decided the cup final"),
        article(3, "Transfer window", "The club signed a striker before the window closed"),
        article(4, "Keeper injury", "The keeper missed training after the derby"),
        article(5, "League table", "Three points lift the club up the league table"),
    ]
}

pub fn params() -> VectorizeParams {
    VectorizeParams {
        tfidf: TfidfParams {
            max_features: 8000,
            min_df: 1,
        },
        ..VectorizeParams::default()
    }
}

/// In-memory backends wired into one context.
pub struct Harness {
    pub corpus: Arc<MemoryCorpus>,
    pub models: Arc<MemoryModelStore>,
    pub profiles: Arc<MemoryProfileStore>,
    pub ctx: Arc<PipelineContext>,
}

impl Harness {
    pub fn new(documents: Vec<Document>) -> (Self, Arc<MemoryVectorIndex>) {
        let index = Arc::new(MemoryVectorIndex::new("articles"));
        let harness = Self::with_index(documents, index.clone());
        (harness, index)
    }

    pub fn with_index(documents: Vec<Document>, index: Arc<dyn VectorIndex>) -> Self {
        let corpus = Arc::new(MemoryCorpus::with_documents(documents));
        let models = Arc::new(MemoryModelStore::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        let ctx = Arc::new(PipelineContext::new(
            params(),
            models.clone(),
            index,
            corpus.clone(),
            profiles.clone(),
        ));
        Self {
            corpus,
            models,
            profiles,
            ctx,
        }
    }

    pub fn pipeline(&self) -> IndexPipeline {
        IndexPipeline::new(Arc::clone(&self.ctx))
    }
}

/// Index that rejects writes for chosen ids, goes unreachable after a
/// number of successful writes, or cannot be cleared.
#[derive(Debug)]
pub struct FailingIndex {
    pub inner: MemoryVectorIndex,
    reject: HashSet<DocumentId>,
    unreachable_after: Option<usize>,
    clear_fails: bool,
    writes: parking_lot::Mutex<usize>,
}

impl FailingIndex {
    pub fn rejecting(ids: &[i64]) -> Self {
        Self {
            inner: MemoryVectorIndex::new("articles"),
            reject: ids.iter().copied().map(DocumentId::new).collect(),
            unreachable_after: None,
            clear_fails: false,
            writes: parking_lot::Mutex::new(0),
        }
    }

    pub fn unreachable_after(writes: usize) -> Self {
        Self {
            inner: MemoryVectorIndex::new("articles"),
            reject: HashSet::new(),
            unreachable_after: Some(writes),
            clear_fails: false,
            writes: parking_lot::Mutex::new(0),
        }
    }

    /// Accepts writes but refuses every delete-by-query.
    pub fn failing_clear() -> Self {
        Self {
            clear_fails: true,
            ..Self::rejecting(&[])
        }
    }
}

impl VectorIndex for FailingIndex {
    fn schema(&self) -> Result<Option<IndexSchema>, IndexError> {
        self.inner.schema()
    }

    fn create(&self, schema: IndexSchema) -> Result<(), IndexError> {
        self.inner.create(schema)
    }

    fn drop_index(&self) -> Result<(), IndexError> {
        self.inner.drop_index()
    }

    fn delete_all(&self) -> Result<u64, IndexError> {
        if self.clear_fails {
            return Err(IndexError::Rejected {
                operation: "delete_by_query",
                status: 409,
                body: "version_conflict_engine_exception".to_string(),
            });
        }
        self.inner.delete_all()
    }

    fn upsert(&self, entry: &EmbeddedDocument) -> Result<(), IndexError> {
        if self.reject.contains(&entry.id) {
            return Err(IndexError::Rejected {
                operation: "upsert",
                status: 400,
                body: format!("mapper_parsing_exception for {}", entry.id),
            });
        }
        let mut writes = self.writes.lock();
        if self.unreachable_after.is_some_and(|limit| *writes >= limit) {
            return Err(IndexError::Unreachable {
                url: "http://localhost:9200".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        *writes += 1;
        self.inner.upsert(entry)
    }

    fn knn(&self, query: &KnnQuery) -> Result<Vec<Hit>, IndexError> {
        self.inner.knn(query)
    }

    fn count(&self) -> Result<u64, IndexError> {
        self.inner.count()
    }
}

/// Index whose first write blocks until the test releases it, so a run can
/// be held mid-flight deterministically.
#[derive(Debug)]
pub struct GatedIndex {
    pub inner: MemoryVectorIndex,
    armed: AtomicBool,
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Test side of a [`GatedIndex`].
pub struct Gate {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl GatedIndex {
    pub fn new() -> (Self, Gate) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let index = Self {
            inner: MemoryVectorIndex::new("articles"),
            armed: AtomicBool::new(true),
            entered: entered_tx,
            release: release_rx,
        };
        let gate = Gate {
            entered: entered_rx,
            release: release_tx,
        };
        (index, gate)
    }
}

impl VectorIndex for GatedIndex {
    fn schema(&self) -> Result<Option<IndexSchema>, IndexError> {
        self.inner.schema()
    }

    fn create(&self, schema: IndexSchema) -> Result<(), IndexError> {
        self.inner.create(schema)
    }

    fn drop_index(&self) -> Result<(), IndexError> {
        self.inner.drop_index()
    }

    fn delete_all(&self) -> Result<u64, IndexError> {
        self.inner.delete_all()
    }

    fn upsert(&self, entry: &EmbeddedDocument) -> Result<(), IndexError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.entered.send(());
            let _ = self.release.recv();
        }
        self.inner.upsert(entry)
    }

    fn knn(&self, query: &KnnQuery) -> Result<Vec<Hit>, IndexError> {
        self.inner.knn(query)
    }

    fn count(&self) -> Result<u64, IndexError> {
        self.inner.count()
    }
}
