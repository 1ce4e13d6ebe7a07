//! Vectorization of article text into fixed-width dense vectors.
//!
//! Text is weighted by a term-frequency model and projected by a truncated
//! SVD. The projection may be narrower than the index schema, in which case
//! every vector is zero-padded to the index width.
//!
//! # Architecture
//! - [`tfidf`]: sparse term weights over a pruned vocabulary
//! - [`reduction`]: dense projection of the term weights
//! - [`engine`]: fit/transform orchestration and model persistence

mod engine;
mod math;
mod reduction;
mod tfidf;
mod types;

pub use engine::{FittedBatch, Vectorized, VectorizeMode, VectorizeParams, Vectorizer, pad_to_target};
pub use math::cosine_similarity;
pub use reduction::{ReductionModel, ReductionParams};
pub use tfidf::{SparseRow, TermWeightModel, TfidfParams};
pub use types::{DEFAULT_FLOOR_DIMS, DEFAULT_TARGET_DIMS, VectorDimension, VectorError};
