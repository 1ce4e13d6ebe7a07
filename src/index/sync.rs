//! Writes a vectorized batch to the index with per-document failure
//! isolation.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{IndexError, IndexSchema, VectorIndex};
use crate::document::{DocumentId, EmbeddedDocument, RunMode};
use crate::vector::VectorDimension;

/// A document whose write did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub id: DocumentId,
    pub reason: String,
}

/// Outcome of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Ids whose write completed, in write order.
    pub written: Vec<DocumentId>,

    /// Ids whose write failed; the rest of the batch still went through.
    pub failed: Vec<WriteFailure>,

    /// Entries removed before writing (Full runs only).
    pub cleared: u64,

    /// Set when the service became unreachable mid-batch. Everything in
    /// `written` completed before that point.
    pub aborted: Option<IndexError>,
}

impl SyncReport {
    #[must_use]
    pub fn failed_ids(&self) -> Vec<DocumentId> {
        self.failed.iter().map(|failure| failure.id).collect()
    }
}

/// Synchronizes vectorized documents into a [`VectorIndex`].
#[derive(Debug)]
pub struct IndexSync<'a> {
    index: &'a dyn VectorIndex,
    dimension: VectorDimension,
}

impl<'a> IndexSync<'a> {
    pub fn new(index: &'a dyn VectorIndex, dimension: VectorDimension) -> Self {
        Self { index, dimension }
    }

    /// Makes sure the index exists with the expected vector width.
    ///
    /// A missing index is created in either mode. A width mismatch is
    /// repaired by drop and recreate on Full runs and is an error on
    /// Incremental runs, which cannot rewrite existing entries.
    pub fn ensure_index(&self, mode: RunMode) -> Result<(), IndexError> {
        let expected = IndexSchema {
            dims: self.dimension,
        };

        match self.index.schema()? {
            None => {
                info!(dims = %self.dimension, "Creating index");
                self.index.create(expected)
            }
            Some(schema) if schema == expected => Ok(()),
            Some(schema) => match mode {
                RunMode::Full => {
                    warn!(
                        existing = %schema.dims,
                        expected = %self.dimension,
                        "Index width differs, recreating index"
                    );
                    self.index.drop_index()?;
                    self.index.create(expected)
                }
                RunMode::Incremental => Err(IndexError::SchemaMismatch {
                    expected: self.dimension.get(),
                    actual: schema.dims.get(),
                }),
            },
        }
    }

    /// Empties the index ahead of a Full rewrite, creating or recreating it
    /// with the expected width first. Returns how many entries were removed.
    pub fn clear_for_rebuild(&self) -> Result<u64, IndexError> {
        self.ensure_index(RunMode::Full)?;
        let cleared = self.index.delete_all()?;
        info!(cleared, "Cleared index for full rebuild");
        Ok(cleared)
    }

    /// Writes `documents` to the index.
    ///
    /// Full runs empty the index first, even for an empty batch, so nothing
    /// from before the run survives. Incremental runs upsert by id and do
    /// nothing at all for an empty batch. Only errors that affect the whole
    /// run (schema problems, failure to clear, the service going away) are
    /// returned as `Err` or recorded in [`SyncReport::aborted`].
    pub fn sync(
        &self,
        documents: &[EmbeddedDocument],
        mode: RunMode,
    ) -> Result<SyncReport, IndexError> {
        let cleared = match mode {
            RunMode::Full => self.clear_for_rebuild()?,
            RunMode::Incremental => {
                if documents.is_empty() {
                    debug!(%mode, "No documents to sync");
                    return Ok(SyncReport::default());
                }
                self.ensure_index(mode)?;
                0
            }
        };

        let mut report = self.write(documents, mode);
        report.cleared = cleared;
        Ok(report)
    }

    /// Upserts `documents` into an index that is already prepared. A failed
    /// write is recorded and skipped; an unreachable service stops the batch.
    pub fn write(&self, documents: &[EmbeddedDocument], mode: RunMode) -> SyncReport {
        let mut report = SyncReport::default();
        for doc in documents {
            if doc.vector.len() != self.dimension.get() {
                let err = IndexError::InvalidVector {
                    id: doc.id,
                    expected: self.dimension.get(),
                    actual: doc.vector.len(),
                };
                warn!(id = %doc.id, "Skipping document: {err}");
                report.failed.push(WriteFailure {
                    id: doc.id,
                    reason: err.to_string(),
                });
                continue;
            }

            match self.index.upsert(doc) {
                Ok(()) => report.written.push(doc.id),
                Err(err) if err.is_transport() => {
                    warn!(id = %doc.id, "Index service unreachable, stopping batch: {err}");
                    report.aborted = Some(err);
                    break;
                }
                Err(err) => {
                    warn!(id = %doc.id, "Failed to index document: {err}");
                    report.failed.push(WriteFailure {
                        id: doc.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if report.aborted.is_none() && !report.written.is_empty() {
            if let Err(err) = self.index.refresh() {
                warn!("Index refresh failed, writes will become visible later: {err}");
            }
        }

        info!(
            %mode,
            written = report.written.len(),
            failed = report.failed.len(),
            "Index sync finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryVectorIndex;
    use chrono::Utc;

    fn doc(id: i64, dims: usize) -> EmbeddedDocument {
        EmbeddedDocument {
            id: DocumentId::new(id),
            title: format!("article {id}"),
            created_at: Utc::now(),
            vector: vec![0.5; dims],
        }
    }

    fn dims(n: usize) -> VectorDimension {
        VectorDimension::new(n).unwrap()
    }

    #[test]
    fn test_full_sync_replaces_entries() {
        let index = MemoryVectorIndex::new("articles");
        let sync = IndexSync::new(&index, dims(4));

        sync.sync(&[doc(1, 4), doc(2, 4)], RunMode::Full).unwrap();
        let report = sync.sync(&[doc(3, 4)], RunMode::Full).unwrap();

        assert_eq!(report.cleared, 2);
        assert_eq!(index.ids(), vec![DocumentId::new(3)]);
    }

    #[test]
    fn test_full_sync_of_empty_batch_still_clears() {
        let index = MemoryVectorIndex::new("articles");
        let sync = IndexSync::new(&index, dims(4));

        sync.sync(&[doc(1, 4), doc(2, 4)], RunMode::Full).unwrap();
        let report = sync.sync(&[], RunMode::Full).unwrap();

        assert_eq!(report.cleared, 2);
        assert!(report.written.is_empty());
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_incremental_sync_of_empty_batch_makes_no_requests() {
        let index = MemoryVectorIndex::new("articles");
        let sync = IndexSync::new(&index, dims(4));

        sync.sync(&[], RunMode::Incremental).unwrap();

        assert_eq!(index.request_count(), 0);
    }

    #[test]
    fn test_incremental_sync_upserts() {
        let index = MemoryVectorIndex::new("articles");
        let sync = IndexSync::new(&index, dims(4));

        sync.sync(&[doc(1, 4)], RunMode::Full).unwrap();
        sync.sync(&[doc(1, 4), doc(2, 4)], RunMode::Incremental)
            .unwrap();

        assert_eq!(index.count().unwrap(), 2);
    }

    #[test]
    fn test_wrong_width_fails_only_that_document() {
        let index = MemoryVectorIndex::new("articles");
        let sync = IndexSync::new(&index, dims(4));

        let report = sync
            .sync(&[doc(1, 4), doc(2, 3), doc(3, 4)], RunMode::Full)
            .unwrap();

        assert_eq!(report.written, vec![DocumentId::new(1), DocumentId::new(3)]);
        assert_eq!(report.failed_ids(), vec![DocumentId::new(2)]);
    }

    #[test]
    fn test_schema_mismatch_by_mode() {
        let index = MemoryVectorIndex::new("articles");
        IndexSync::new(&index, dims(3))
            .sync(&[doc(1, 3)], RunMode::Full)
            .unwrap();

        let wider = IndexSync::new(&index, dims(4));
        let err = wider.sync(&[doc(2, 4)], RunMode::Incremental).unwrap_err();
        assert!(matches!(
            err,
            IndexError::SchemaMismatch {
                expected: 4,
                actual: 3
            }
        ));

        wider.sync(&[doc(2, 4)], RunMode::Full).unwrap();
        assert_eq!(index.schema().unwrap().unwrap().dims, dims(4));
        assert_eq!(index.ids(), vec![DocumentId::new(2)]);
    }
}
