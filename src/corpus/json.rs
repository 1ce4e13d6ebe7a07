//! Corpus stored as a JSON array of article records.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{CorpusConnection, CorpusError, CorpusSource};
use crate::document::{Document, DocumentId, RunMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArticleRecord {
    id: DocumentId,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    indexed: bool,
}

fn default_visible() -> bool {
    true
}

impl From<&ArticleRecord> for Document {
    fn from(record: &ArticleRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            body: record.content.clone(),
            created_at: record.created_at,
            indexed: record.indexed,
        }
    }
}

/// File-backed corpus. Flag updates rewrite the whole file through a
/// temporary file in the same directory, then rename it into place.
#[derive(Debug, Clone)]
pub struct JsonCorpus {
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `documents` as a fresh corpus file, all visible.
    pub fn create(path: impl Into<PathBuf>, documents: &[Document]) -> Result<Self, CorpusError> {
        let corpus = Self::new(path);
        let records: Vec<ArticleRecord> = documents
            .iter()
            .map(|doc| ArticleRecord {
                id: doc.id,
                title: doc.title.clone(),
                content: doc.body.clone(),
                created_at: doc.created_at,
                visible: true,
                indexed: doc.indexed,
            })
            .collect();
        write_records(&corpus.path, &records)?;
        Ok(corpus)
    }
}

impl CorpusSource for JsonCorpus {
    fn connect(&self) -> Result<Box<dyn CorpusConnection + '_>, CorpusError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            CorpusError::Connection(format!("cannot read '{}': {e}", self.path.display()))
        })?;
        let mut records: Vec<ArticleRecord> =
            serde_json::from_str(&contents).map_err(|e| CorpusError::Format(e.to_string()))?;
        records.sort_by_key(|record| record.id);

        debug!(path = %self.path.display(), records = records.len(), "Opened JSON corpus");
        Ok(Box::new(JsonConnection {
            path: &self.path,
            records,
        }))
    }
}

struct JsonConnection<'a> {
    path: &'a Path,
    records: Vec<ArticleRecord>,
}

impl CorpusConnection for JsonConnection<'_> {
    fn fetch_candidates(&mut self, mode: RunMode) -> Result<Vec<Document>, CorpusError> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.visible)
            .filter(|record| mode == RunMode::Full || !record.indexed)
            .map(Document::from)
            .collect())
    }

    fn mark_indexed(&mut self, ids: &[DocumentId]) -> Result<u64, CorpusError> {
        let mut changed = 0;
        for record in self.records.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.indexed = true;
            changed += 1;
        }
        write_records(self.path, &self.records)
            .map_err(|e| CorpusError::Update(e.to_string()))?;
        Ok(changed)
    }

    fn clear_all_indexed(&mut self) -> Result<u64, CorpusError> {
        let mut cleared = 0;
        for record in self.records.iter_mut().filter(|r| r.indexed) {
            record.indexed = false;
            cleared += 1;
        }
        write_records(self.path, &self.records)
            .map_err(|e| CorpusError::Update(e.to_string()))?;
        Ok(cleared)
    }
}

fn write_records(path: &Path, records: &[ArticleRecord]) -> Result<(), CorpusError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(records).map_err(|e| CorpusError::Format(e.to_string()))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CorpusError::Io(e.error))?;
    Ok(())
}
