//! Core data types flowing through an indexing run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of an article in the corpus and in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(i64);

impl DocumentId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// An article as read from the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub indexed: bool,
}

impl Document {
    /// Text fed to vectorization: the title followed by the body.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }
}

/// A document with its dense vector, ready to be written to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    pub id: DocumentId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub vector: Vec<f32>,
}

/// Kind of indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Refit the models over every eligible document and replace the index.
    Full,
    /// Encode only documents not yet indexed with the current models.
    Incremental,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// One ranked result of a search or recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: DocumentId,
    pub title: String,
    pub score: f32,
}
