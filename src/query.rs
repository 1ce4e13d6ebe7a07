//! Read paths over the index: free-text search and profile recommendations.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::document::Hit;
use crate::error::PipelineError;
use crate::index::{IndexError, KnnQuery, VectorIndex};
use crate::vector::Vectorizer;

/// Source of precomputed user profile vectors.
///
/// A user without a profile is `Ok(None)`, not an error.
pub trait ProfileStore: Send + Sync + std::fmt::Debug {
    fn profile_vector(&self, user_id: i64) -> Result<Option<Vec<f32>>, IndexError>;
}

/// In-process profile store.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<i64, Vec<f32>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: i64, vector: Vec<f32>) {
        self.profiles.insert(user_id, vector);
    }
}

impl ProfileStore for MemoryProfileStore {
    fn profile_vector(&self, user_id: i64) -> Result<Option<Vec<f32>>, IndexError> {
        Ok(self.profiles.get(&user_id).map(|v| v.clone()))
    }
}

/// Serves search and recommend requests. Never mutates the index or the
/// model store.
#[derive(Debug, Clone)]
pub struct QueryService {
    vectorizer: Vectorizer,
    index: Arc<dyn VectorIndex>,
    profiles: Arc<dyn ProfileStore>,
    num_candidates: usize,
}

impl QueryService {
    pub fn new(
        vectorizer: Vectorizer,
        index: Arc<dyn VectorIndex>,
        profiles: Arc<dyn ProfileStore>,
        num_candidates: usize,
    ) -> Self {
        Self {
            vectorizer,
            index,
            profiles,
            num_candidates,
        }
    }

    /// Ranked articles most similar to `text`.
    ///
    /// Fails with [`PipelineError::ModelUnavailable`] before touching the
    /// index if no model pair has been fitted.
    pub fn search(&self, text: &str, top_k: usize) -> Result<Vec<Hit>, PipelineError> {
        let vector = self.vectorizer.transform_query(text)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .index
            .knn(&KnnQuery::new(vector, top_k, self.num_candidates))?;
        debug!(query = text, hits = hits.len(), "Search finished");
        Ok(hits)
    }

    /// Ranked articles closest to the user's profile vector. A user without
    /// a profile gets an empty list.
    pub fn recommend(&self, user_id: i64, top_k: usize) -> Result<Vec<Hit>, PipelineError> {
        let Some(vector) = self.profiles.profile_vector(user_id)? else {
            info!(user_id, "No profile vector for user");
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let expected = self.vectorizer.target();
        if vector.len() != expected.get() {
            return Err(IndexError::InvalidVector {
                id: crate::document::DocumentId::new(user_id),
                expected: expected.get(),
                actual: vector.len(),
            }
            .into());
        }

        let hits = self
            .index
            .knn(&KnnQuery::new(vector, top_k, self.num_candidates))?;
        debug!(user_id, hits = hits.len(), "Recommendation finished");
        Ok(hits)
    }
}
