//! Vectorizer that orchestrates model fitting, transforms and padding.
//!
//! This module is the single entry point for turning documents or query text
//! into index-width vectors, coordinating the term-weighting model, the
//! reduction model and the model store.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::document::{Document, EmbeddedDocument};
use crate::error::PipelineError;
use crate::models::{ModelPair, ModelStore};
use crate::text::clean_text;
use crate::vector::{
    DEFAULT_FLOOR_DIMS, ReductionModel, ReductionParams, TermWeightModel, TfidfParams,
    VectorDimension, VectorError,
};

/// Whether a vectorize call refits the models or reuses the stored pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorizeMode {
    /// Fit a new pair over the batch and persist it.
    Fit,
    /// Encode the batch with the current stored pair.
    TransformOnly,
}

/// Tunables for fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorizeParams {
    /// Width of every vector written to the index.
    pub target: VectorDimension,
    /// Lower bound on the reduction width for small vocabularies.
    pub floor_dims: usize,
    pub tfidf: TfidfParams,
    pub power_iterations: usize,
    pub oversamples: usize,
    pub seed: u64,
}

impl Default for VectorizeParams {
    fn default() -> Self {
        Self {
            target: VectorDimension::target_default(),
            floor_dims: DEFAULT_FLOOR_DIMS,
            tfidf: TfidfParams {
                max_features: 8000,
                min_df: 2,
            },
            power_iterations: 5,
            oversamples: 10,
            seed: 42,
        }
    }
}

/// Output of [`Vectorizer::vectorize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Vectorized {
    /// Input documents with their vectors, in input order.
    pub documents: Vec<EmbeddedDocument>,

    /// Output width of the model pair used; 0 for an empty batch.
    pub reduction_width: usize,

    /// Zeros appended to each vector; 0 for an empty batch.
    pub padding: usize,
}

impl Vectorized {
    fn empty() -> Self {
        Self {
            documents: Vec::new(),
            reduction_width: 0,
            padding: 0,
        }
    }
}

/// A freshly fitted pair and the batch it encoded, not yet saved.
#[derive(Debug)]
pub struct FittedBatch {
    pair: ModelPair,
    vectorized: Vectorized,
}

impl FittedBatch {
    #[must_use]
    pub fn vectorized(&self) -> &Vectorized {
        &self.vectorized
    }
}

/// Turns documents and query text into fixed-width vectors.
#[derive(Debug, Clone)]
pub struct Vectorizer {
    params: VectorizeParams,
    store: Arc<dyn ModelStore>,
}

impl Vectorizer {
    pub fn new(params: VectorizeParams, store: Arc<dyn ModelStore>) -> Self {
        Self { params, store }
    }

    /// Index width every produced vector has.
    #[must_use]
    pub fn target(&self) -> VectorDimension {
        self.params.target
    }

    /// Store holding the current model pair.
    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    /// Encodes a batch of documents.
    ///
    /// In [`VectorizeMode::Fit`] a new model pair is fitted over the batch
    /// and saved before any vector is returned. In
    /// [`VectorizeMode::TransformOnly`] the stored pair is used and a missing
    /// pair fails with [`PipelineError::ModelUnavailable`]. An empty batch is
    /// a no-op in both modes and touches neither the models nor the store.
    pub fn vectorize(
        &self,
        documents: &[Document],
        mode: VectorizeMode,
    ) -> Result<Vectorized, PipelineError> {
        match mode {
            VectorizeMode::Fit => match self.fit_batch(documents)? {
                Some(batch) => self.publish(batch),
                None => Ok(Vectorized::empty()),
            },
            VectorizeMode::TransformOnly => self.transform_batch(documents),
        }
    }

    /// Fits a new pair over `documents` and encodes them without touching
    /// the store. Returns `None` for an empty batch.
    ///
    /// The pair only becomes visible to other callers through
    /// [`Vectorizer::publish`].
    pub fn fit_batch(&self, documents: &[Document]) -> Result<Option<FittedBatch>, PipelineError> {
        if documents.is_empty() {
            debug!("Empty batch, nothing to fit");
            return Ok(None);
        }

        let texts = clean_all(documents);
        let (pair, vectors) = self.fit(&texts)?;
        let vectorized = self.encode(documents, &pair, vectors)?;
        Ok(Some(FittedBatch { pair, vectorized }))
    }

    /// Saves the batch's pair, replacing the stored one, and hands back its
    /// vectors.
    pub fn publish(&self, batch: FittedBatch) -> Result<Vectorized, PipelineError> {
        self.store.save(batch.pair)?;
        info!(
            reduction_width = batch.vectorized.reduction_width,
            "Published model pair"
        );
        Ok(batch.vectorized)
    }

    fn transform_batch(&self, documents: &[Document]) -> Result<Vectorized, PipelineError> {
        if documents.is_empty() {
            debug!("Empty batch, nothing to vectorize");
            return Ok(Vectorized::empty());
        }

        let pair = self.store.load()?;
        let vectors = clean_all(documents)
            .par_iter()
            .map(|text| {
                pair.reduction
                    .transform(&pair.term_weights.transform(text))
            })
            .collect::<Vec<_>>();
        self.encode(documents, &pair, vectors)
    }

    /// Pads `vectors` to the target width and attaches them to `documents`.
    fn encode(
        &self,
        documents: &[Document],
        pair: &ModelPair,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vectorized, PipelineError> {
        let reduction_width = pair.reduction.output_width();
        let padding = self.padding_for(pair)?;

        let documents = documents
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                Ok(EmbeddedDocument {
                    id: doc.id,
                    title: doc.title.clone(),
                    created_at: doc.created_at,
                    vector: pad_to_target(vector, self.params.target)?,
                })
            })
            .collect::<Result<Vec<_>, VectorError>>()?;

        debug!(
            documents = documents.len(),
            reduction_width, padding, "Vectorized batch"
        );

        Ok(Vectorized {
            documents,
            reduction_width,
            padding,
        })
    }

    /// Encodes free text with the stored pair. The text goes through the
    /// same cleaning as documents.
    pub fn transform_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let pair = self.store.load()?;
        self.padding_for(&pair)?;

        let cleaned = clean_text(text);
        let reduced = pair
            .reduction
            .transform(&pair.term_weights.transform(&cleaned));
        Ok(pad_to_target(reduced, self.params.target)?)
    }

    /// Fits a pair over cleaned texts and returns it with the unpadded
    /// vectors of the same texts.
    fn fit(&self, texts: &[String]) -> Result<(ModelPair, Vec<Vec<f32>>), PipelineError> {
        let (term_weights, matrix) = TermWeightModel::fit_transform(texts, self.params.tfidf)?;
        let vocabulary_size = term_weights.vocabulary_size();

        let width = self
            .params
            .target
            .reduction_width(self.params.floor_dims, vocabulary_size);
        let reduction_params = ReductionParams {
            width,
            power_iterations: self.params.power_iterations,
            oversamples: self.params.oversamples,
            seed: self.params.seed,
        };
        let reduction = ReductionModel::fit(&matrix, vocabulary_size, &reduction_params);

        info!(
            documents = texts.len(),
            vocabulary_size,
            reduction_width = width.get(),
            effective_rank = reduction.effective_rank(),
            "Fitted model pair"
        );

        let vectors = matrix.par_iter().map(|row| reduction.transform(row)).collect();
        let pair = ModelPair::new(term_weights, reduction, self.params.target.get());
        Ok((pair, vectors))
    }

    /// Padding derived from the pair's own width against the configured
    /// target.
    fn padding_for(&self, pair: &ModelPair) -> Result<usize, VectorError> {
        let model = pair.reduction.output_width();
        let target = self.params.target.get();
        if model > target {
            return Err(VectorError::ModelWiderThanTarget { model, target });
        }
        Ok(target - model)
    }
}

fn clean_all(documents: &[Document]) -> Vec<String> {
    documents
        .par_iter()
        .map(|doc| clean_text(&doc.text()))
        .collect()
}

/// Appends zeros so `vector` has exactly `target` components.
///
/// Fails if the vector is already wider than the target; truncation would
/// silently change similarity scores.
pub fn pad_to_target(mut vector: Vec<f32>, target: VectorDimension) -> Result<Vec<f32>, VectorError> {
    let target = target.get();
    if vector.len() > target {
        return Err(VectorError::ModelWiderThanTarget {
            model: vector.len(),
            target,
        });
    }
    vector.resize(target, 0.0);
    Ok(vector)
}
