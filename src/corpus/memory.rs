use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{CorpusConnection, CorpusError, CorpusSource};
use crate::document::{Document, DocumentId, RunMode};

#[derive(Debug, Clone)]
struct Article {
    document: Document,
    visible: bool,
}

/// In-process corpus.
///
/// Tracks open connections and issued update statements so callers can
/// check that runs release their handle and batch their flag updates.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    articles: Mutex<Vec<Article>>,
    open_connections: AtomicUsize,
    connections_opened: AtomicUsize,
    update_statements: AtomicUsize,
    unreachable: AtomicBool,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let corpus = Self::new();
        for doc in documents {
            corpus.insert(doc);
        }
        corpus
    }

    /// Adds or replaces a visible document.
    pub fn insert(&self, document: Document) {
        self.insert_with_visibility(document, true);
    }

    /// Adds or replaces a document that is not eligible for indexing.
    pub fn insert_hidden(&self, document: Document) {
        self.insert_with_visibility(document, false);
    }

    fn insert_with_visibility(&self, document: Document, visible: bool) {
        let mut articles = self.articles.lock();
        articles.retain(|article| article.document.id != document.id);
        articles.push(Article { document, visible });
        articles.sort_by_key(|article| article.document.id);
    }

    /// Current state of `id`.
    pub fn get(&self, id: DocumentId) -> Option<Document> {
        self.articles
            .lock()
            .iter()
            .find(|article| article.document.id == id)
            .map(|article| article.document.clone())
    }

    /// Ids currently flagged as indexed.
    pub fn indexed_ids(&self) -> Vec<DocumentId> {
        self.articles
            .lock()
            .iter()
            .filter(|article| article.document.indexed)
            .map(|article| article.document.id)
            .collect()
    }

    /// Connections not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Connections opened since creation.
    pub fn connections_opened(&self) -> usize {
        self.connections_opened.load(Ordering::SeqCst)
    }

    /// Update statements issued since creation.
    pub fn update_statements(&self) -> usize {
        self.update_statements.load(Ordering::SeqCst)
    }

    /// Makes `connect` fail, standing in for a database outage.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn flag_indexed(&self, ids: &[DocumentId]) -> u64 {
        self.update_statements.fetch_add(1, Ordering::SeqCst);
        let mut changed = 0;
        for article in self.articles.lock().iter_mut() {
            if ids.contains(&article.document.id) {
                article.document.indexed = true;
                changed += 1;
            }
        }
        changed
    }
}

impl CorpusSource for MemoryCorpus {
    fn connect(&self) -> Result<Box<dyn CorpusConnection + '_>, CorpusError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CorpusError::Connection("memory corpus marked unreachable".to_string()));
        }
        self.open_connections.fetch_add(1, Ordering::SeqCst);
        self.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection { corpus: self }))
    }
}

struct MemoryConnection<'a> {
    corpus: &'a MemoryCorpus,
}

impl CorpusConnection for MemoryConnection<'_> {
    fn fetch_candidates(&mut self, mode: RunMode) -> Result<Vec<Document>, CorpusError> {
        Ok(self
            .corpus
            .articles
            .lock()
            .iter()
            .filter(|article| article.visible)
            .filter(|article| mode == RunMode::Full || !article.document.indexed)
            .map(|article| article.document.clone())
            .collect())
    }

    fn mark_indexed(&mut self, ids: &[DocumentId]) -> Result<u64, CorpusError> {
        Ok(self.corpus.flag_indexed(ids))
    }

    fn clear_all_indexed(&mut self) -> Result<u64, CorpusError> {
        self.corpus.update_statements.fetch_add(1, Ordering::SeqCst);
        let mut cleared = 0;
        for article in self.corpus.articles.lock().iter_mut() {
            if article.document.indexed {
                article.document.indexed = false;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

impl Drop for MemoryConnection<'_> {
    fn drop(&mut self) {
        self.corpus.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}
