//! Vector index access and synchronization.
//!
//! [`VectorIndex`] is the narrow surface the pipeline needs from the index
//! service. [`IndexSync`] builds the run-level write semantics on top of it:
//! schema reconciliation, full replace vs. incremental upsert, and
//! per-document failure isolation.

mod elastic;
mod memory;
mod sync;

pub use elastic::ElasticIndex;
pub use memory::MemoryVectorIndex;
pub use sync::{IndexSync, SyncReport, WriteFailure};

use thiserror::Error;

use crate::document::{EmbeddedDocument, Hit};
use crate::vector::VectorDimension;

/// Name of the dense vector field in the index mapping.
pub const VECTOR_FIELD: &str = "vector";

/// Fields returned with every hit.
pub const SOURCE_FIELDS: [&str; 3] = ["id", "title", "created_at"];

/// The parts of the index mapping the pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSchema {
    pub dims: VectorDimension,
}

/// Approximate nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnQuery {
    pub field: &'static str,
    pub vector: Vec<f32>,
    pub k: usize,
    pub num_candidates: usize,
}

impl KnnQuery {
    /// Query over [`VECTOR_FIELD`]. `num_candidates` is raised to `k` if
    /// smaller, since the service rejects fewer candidates than results.
    pub fn new(vector: Vec<f32>, k: usize, num_candidates: usize) -> Self {
        Self {
            field: VECTOR_FIELD,
            vector,
            k,
            num_candidates: num_candidates.max(k),
        }
    }
}

/// Operations the pipeline and query paths need from the index service.
///
/// Implementations are shared across threads; the service itself is
/// responsible for concurrent read/write safety.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Current schema, or `None` if the index does not exist.
    fn schema(&self) -> Result<Option<IndexSchema>, IndexError>;

    /// Creates the index. Creating an index that already exists is not an
    /// error.
    fn create(&self, schema: IndexSchema) -> Result<(), IndexError>;

    /// Removes the index and its entries. Dropping a missing index is not an
    /// error.
    fn drop_index(&self) -> Result<(), IndexError>;

    /// Deletes every entry, returning how many were removed.
    fn delete_all(&self) -> Result<u64, IndexError>;

    /// Inserts or replaces the entry keyed by `entry.id`.
    fn upsert(&self, entry: &EmbeddedDocument) -> Result<(), IndexError>;

    /// Makes completed writes visible to searches.
    fn refresh(&self) -> Result<(), IndexError> {
        Ok(())
    }

    /// Ranked hits most similar to the query vector.
    fn knn(&self, query: &KnnQuery) -> Result<Vec<Hit>, IndexError>;

    /// Number of entries.
    fn count(&self) -> Result<u64, IndexError>;
}

/// Errors from the index service.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index service at {url} is unreachable: {reason}\nSuggestion: Check that the service is running")]
    Unreachable { url: String, reason: String },

    #[error("Index service rejected {operation} with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Index '{name}' does not exist\nSuggestion: Run 'artvec index --full' to create it")]
    MissingIndex { name: String },

    #[error(
        "Index vector width is {actual}, expected {expected}\nSuggestion: Run 'artvec index --full' to rebuild the index"
    )]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Malformed response from index service: {0}")]
    InvalidResponse(String),

    #[error("Vector for document {id} has width {actual}, index expects {expected}")]
    InvalidVector {
        id: crate::document::DocumentId,
        expected: usize,
        actual: usize,
    },
}

impl IndexError {
    /// Whether the failure is about reaching the service at all, as opposed
    /// to a single request being refused.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}
