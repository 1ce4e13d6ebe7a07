//! Type-safe wrappers and core types for vectorization.
//!
//! Vector widths flow through the whole pipeline (model fit, transform,
//! padding, index schema), so they get their own newtype instead of a bare
//! `usize`.

use thiserror::Error;

/// Default width of every vector written to the index.
pub const DEFAULT_TARGET_DIMS: usize = 1000;

/// Default lower bound for the reduction width on small corpora.
pub const DEFAULT_FLOOR_DIMS: usize = 50;

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector widths to prevent mismatches
/// between fitted models, the index schema and query vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// The default index width (1000).
    #[must_use]
    pub const fn target_default() -> Self {
        Self(DEFAULT_TARGET_DIMS)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Width chosen for a reduction model fitted over `vocabulary_size` terms.
    ///
    /// `min(target, max(floor, vocabulary_size))`: the reduction can never
    /// usefully exceed the vocabulary, but tiny corpora still get `floor`
    /// columns instead of a near-empty model.
    #[must_use]
    pub fn reduction_width(self, floor: usize, vocabulary_size: usize) -> Self {
        Self(self.0.min(floor.max(vocabulary_size)).max(1))
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during vectorization.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Run a full rebuild so models and index share the same width"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "No terms remain after pruning {documents} documents with min_df={min_df}\nSuggestion: Lower vectorize.min_df or add more documents"
    )]
    EmptyVocabulary { documents: usize, min_df: usize },

    #[error(
        "Reduction model width {model} exceeds index width {target}\nSuggestion: Run a full rebuild after changing vectorize.target_dims"
    )]
    ModelWiderThanTarget { model: usize, target: usize },

    #[error("Invalid model parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
