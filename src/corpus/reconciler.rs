//! The only writer of the `indexed` flag.

use tracing::{debug, info};

use super::{CorpusConnection, CorpusError};
use crate::document::DocumentId;

/// Updates the corpus flag from the ids the index confirmed.
///
/// Callers pass the written ids reported by the index sync, never the
/// candidate set, so a document is only flagged once its entry exists.
pub struct FlagReconciler<'c, 'a> {
    connection: &'c mut (dyn CorpusConnection + 'a),
}

impl<'c, 'a> FlagReconciler<'c, 'a> {
    pub fn new(connection: &'c mut (dyn CorpusConnection + 'a)) -> Self {
        Self { connection }
    }

    /// Flags `ids` as indexed in one batched update. Empty `ids` issue no
    /// write.
    pub fn mark_indexed(&mut self, ids: &[DocumentId]) -> Result<u64, CorpusError> {
        if ids.is_empty() {
            debug!("No written documents to flag");
            return Ok(0);
        }
        let updated = self.connection.mark_indexed(ids)?;
        info!(updated, "Flagged documents as indexed");
        Ok(updated)
    }

    /// Clears every flag once a Full run has emptied the index, so that no
    /// document, hidden or not, claims an entry that no longer exists.
    pub fn clear_all(&mut self) -> Result<u64, CorpusError> {
        let cleared = self.connection.clear_all_indexed()?;
        info!(cleared, "Cleared indexed flags after emptying the index");
        Ok(cleared)
    }
}
