//! Access to the article corpus.
//!
//! A [`CorpusSource`] hands out one [`CorpusConnection`] per run. The
//! connection is the scoped handle: it is opened at the start of a run and
//! released when dropped, on every exit path.

mod json;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod reconciler;

pub use json::JsonCorpus;
pub use memory::MemoryCorpus;
#[cfg(feature = "postgres")]
pub use postgres::PostgresCorpus;
pub use reconciler::FlagReconciler;

use thiserror::Error;

use crate::document::{Document, DocumentId, RunMode};

/// Factory for per-run corpus connections.
pub trait CorpusSource: Send + Sync + std::fmt::Debug {
    /// Opens a connection for one run.
    fn connect(&self) -> Result<Box<dyn CorpusConnection + '_>, CorpusError>;
}

/// Operations available while a run holds the corpus.
pub trait CorpusConnection {
    /// Documents eligible for `mode`: every visible document for
    /// [`RunMode::Full`], only those not yet indexed for
    /// [`RunMode::Incremental`]. Ordered by id.
    fn fetch_candidates(&mut self, mode: RunMode) -> Result<Vec<Document>, CorpusError>;

    /// Sets `indexed = true` for `ids` in one batched update.
    fn mark_indexed(&mut self, ids: &[DocumentId]) -> Result<u64, CorpusError>;

    /// Sets `indexed = false` on every document, hidden ones included, in
    /// one update. Returns the number of flags that were set.
    fn clear_all_indexed(&mut self) -> Result<u64, CorpusError>;
}

/// Errors from the corpus backend.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to connect to corpus: {0}\nSuggestion: Check corpus.url or corpus.path")]
    Connection(String),

    #[error("Corpus query failed: {0}")]
    Query(String),

    #[error("Corpus update failed: {0}")]
    Update(String),

    #[error("Corpus I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corpus file is malformed: {0}")]
    Format(String),
}
