//! Persistence for the fitted model pair.
//!
//! The term-weighting model and the reduction model are only meaningful
//! together: the reduction's input width is the term model's vocabulary.
//! Stores therefore load and save them as one unit, and a reader either sees
//! the previous pair or the new one, never a mix.

mod file;
mod memory;

pub use file::FileModelStore;
pub use memory::MemoryModelStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector::{ReductionModel, TermWeightModel};

/// Descriptive data recorded alongside a fitted pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// When the pair was fitted
    pub fitted_at: DateTime<Utc>,

    /// Number of documents in the fitting corpus
    pub documents: usize,

    /// Terms retained by the term-weighting model
    pub vocabulary_size: usize,

    /// Output width of the reduction model
    pub reduction_width: usize,

    /// Index width the pair was fitted for
    pub target_dims: usize,

    /// Version of the artifact format
    pub version: u32,
}

impl ModelMetadata {
    /// Current artifact format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Zeros appended to every vector produced by this pair.
    #[must_use]
    pub fn padding(&self) -> usize {
        self.target_dims.saturating_sub(self.reduction_width)
    }
}

/// The two models produced together by one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPair {
    pub term_weights: TermWeightModel,
    pub reduction: ReductionModel,
    pub metadata: ModelMetadata,
}

impl ModelPair {
    /// Bundles freshly fitted models, deriving the metadata from them.
    pub fn new(term_weights: TermWeightModel, reduction: ReductionModel, target_dims: usize) -> Self {
        let metadata = ModelMetadata {
            fitted_at: Utc::now(),
            documents: term_weights.documents(),
            vocabulary_size: term_weights.vocabulary_size(),
            reduction_width: reduction.output_width(),
            target_dims,
            version: ModelMetadata::CURRENT_VERSION,
        };
        Self {
            term_weights,
            reduction,
            metadata,
        }
    }

    /// Checks that the two models fit together.
    pub fn validate(&self) -> Result<(), ModelStoreError> {
        if self.term_weights.vocabulary_size() != self.reduction.input_width() {
            return Err(ModelStoreError::Corrupt {
                reason: format!(
                    "term model has {} terms but reduction expects {} inputs",
                    self.term_weights.vocabulary_size(),
                    self.reduction.input_width()
                ),
            });
        }
        if self.metadata.reduction_width != self.reduction.output_width() {
            return Err(ModelStoreError::Corrupt {
                reason: format!(
                    "metadata records width {} but reduction produces {}",
                    self.metadata.reduction_width,
                    self.reduction.output_width()
                ),
            });
        }
        Ok(())
    }
}

/// Load/save of the current model pair.
///
/// Implementations must make `save` atomic with respect to `load`.
pub trait ModelStore: Send + Sync + std::fmt::Debug {
    /// Loads the current pair.
    ///
    /// Fails with [`ModelStoreError::Absent`] if no pair was ever saved and
    /// with [`ModelStoreError::Corrupt`] if one exists but cannot be read.
    fn load(&self) -> Result<Arc<ModelPair>, ModelStoreError>;

    /// Replaces the current pair.
    fn save(&self, pair: ModelPair) -> Result<Arc<ModelPair>, ModelStoreError>;

    /// Whether a pair has been saved.
    fn exists(&self) -> bool;

    /// Metadata of the current pair.
    fn metadata(&self) -> Result<ModelMetadata, ModelStoreError> {
        self.load().map(|pair| pair.metadata.clone())
    }
}

/// Errors from model persistence.
#[derive(Error, Debug)]
pub enum ModelStoreError {
    #[error("No fitted model pair found at {location}\nSuggestion: Run 'artvec index --full' first")]
    Absent { location: String },

    #[error("Model pair is corrupt: {reason}\nSuggestion: Run 'artvec index --full' to refit")]
    Corrupt { reason: String },

    #[error("Model store I/O failed: {0}\nSuggestion: Check disk space and permissions")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode model pair: {0}")]
    Encode(String),
}
