//! Error types for indexing runs and queries
//!
//! Each layer owns its error enum (`VectorError`, `ModelStoreError`,
//! `IndexError`, `CorpusError`). `PipelineError` wraps them at the run and
//! query level, where callers need a single type with stable status codes.

use thiserror::Error;

use crate::corpus::CorpusError;
use crate::index::IndexError;
use crate::models::ModelStoreError;
use crate::vector::VectorError;

/// Run-level and query-level failure
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A transform was requested before any model pair was fitted
    #[error("No fitted model pair available at {location}\nSuggestion: Run 'artvec index --full' first")]
    ModelUnavailable { location: String },

    #[error(transparent)]
    ModelStore(ModelStoreError),

    #[error("Vectorization failed: {0}")]
    Vectorize(#[from] VectorError),

    #[error("Index operation failed: {0}")]
    Index(#[from] IndexError),

    #[error("Corpus operation failed: {0}")]
    Corpus(#[from] CorpusError),

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// A run panicked; the worker survived it
    #[error("Run panicked: {message}")]
    Panicked { message: String },
}

impl From<ModelStoreError> for PipelineError {
    fn from(err: ModelStoreError) -> Self {
        match err {
            ModelStoreError::Absent { location } => Self::ModelUnavailable { location },
            other => Self::ModelStore(other),
        }
    }
}

impl PipelineError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::ModelStore(ModelStoreError::Corrupt { .. }) => "MODEL_CORRUPT",
            Self::ModelStore(_) => "MODEL_STORE_ERROR",
            Self::Vectorize(VectorError::EmptyVocabulary { .. }) => "EMPTY_VOCABULARY",
            Self::Vectorize(_) => "VECTORIZE_ERROR",
            Self::Index(IndexError::Unreachable { .. }) => "INDEX_UNREACHABLE",
            Self::Index(IndexError::SchemaMismatch { .. }) => "INDEX_SCHEMA_MISMATCH",
            Self::Index(IndexError::MissingIndex { .. }) => "INDEX_MISSING",
            Self::Index(_) => "INDEX_ERROR",
            Self::Corpus(_) => "CORPUS_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Panicked { .. } => "RUN_PANICKED",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::ModelUnavailable { .. } => vec![
                "Run 'artvec index --full' to fit the first model pair",
                "Incremental runs and searches need a fitted pair",
            ],
            Self::ModelStore(ModelStoreError::Corrupt { .. }) => vec![
                "Run 'artvec index --full' to refit and overwrite the artifact",
                "Check for disk errors or filesystem corruption",
            ],
            Self::ModelStore(_) => vec!["Check disk space and permissions in the models directory"],
            Self::Vectorize(VectorError::EmptyVocabulary { .. }) => vec![
                "Lower vectorize.min_df in .artvec/settings.toml",
                "Add more approved articles before the first full run",
            ],
            Self::Vectorize(VectorError::ModelWiderThanTarget { .. }) => vec![
                "Run 'artvec index --full' after changing vectorize.target_dims",
            ],
            Self::Index(IndexError::Unreachable { .. }) => vec![
                "Check that the index service is running at index.url",
                "The next scheduled run will try again",
            ],
            Self::Index(IndexError::SchemaMismatch { .. } | IndexError::MissingIndex { .. }) => {
                vec!["Run 'artvec index --full' to rebuild the index"]
            }
            Self::Corpus(_) => vec![
                "Check that the corpus backend is reachable",
                "Verify corpus.path or corpus.url in .artvec/settings.toml",
            ],
            Self::Config { .. } => vec!["Run 'artvec config' to inspect the effective settings"],
            _ => vec![],
        }
    }

    /// Whether the error means no model pair has been fitted yet.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}

/// Result type alias for run and query operations
pub type PipelineResult<T> = Result<T, PipelineError>;
