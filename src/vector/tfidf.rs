//! Term-weighting model: frequency-weighted term statistics over a corpus.
//!
//! # Weighting
//! - Tokens: maximal runs of two or more word characters
//! - Vocabulary: terms seen in at least `min_df` documents, capped at the
//!   `max_features` most frequent terms (ties broken alphabetically)
//! - Weight: raw count times smoothed idf `ln((1 + n) / (1 + df)) + 1`
//! - Rows are L2-normalized

use std::collections::HashMap;
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::vector::VectorError;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

/// Sparse term-weight row: `(column, weight)` pairs sorted by column.
pub type SparseRow = Vec<(u32, f32)>;

/// Bounds applied while building the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TfidfParams {
    /// Maximum vocabulary size.
    pub max_features: usize,
    /// Minimum number of documents a term must appear in.
    pub min_df: usize,
}

/// Fitted term-weighting model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermWeightModel {
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
    documents: usize,
}

impl TermWeightModel {
    /// Fits the model over `texts` and returns it together with the
    /// weighted matrix of the same texts, so callers don't tokenize twice.
    pub fn fit_transform(
        texts: &[String],
        params: TfidfParams,
    ) -> Result<(Self, Vec<SparseRow>), VectorError> {
        if params.min_df == 0 {
            return Err(VectorError::InvalidParameter {
                name: "min_df",
                reason: "must be at least 1".to_string(),
            });
        }
        if params.max_features == 0 {
            return Err(VectorError::InvalidParameter {
                name: "max_features",
                reason: "must be at least 1".to_string(),
            });
        }

        let counts: Vec<HashMap<&str, u32>> = texts.par_iter().map(|t| count_terms(t)).collect();

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        let mut term_frequency: HashMap<&str, u64> = HashMap::new();
        for doc in &counts {
            for (term, count) in doc {
                *document_frequency.entry(*term).or_default() += 1;
                *term_frequency.entry(*term).or_default() += u64::from(*count);
            }
        }

        let mut kept: Vec<&str> = document_frequency
            .iter()
            .filter(|(_, df)| **df >= params.min_df)
            .map(|(term, _)| *term)
            .collect();

        if kept.is_empty() {
            return Err(VectorError::EmptyVocabulary {
                documents: texts.len(),
                min_df: params.min_df,
            });
        }

        if kept.len() > params.max_features {
            kept.sort_by(|a, b| term_frequency[b].cmp(&term_frequency[a]).then(a.cmp(b)));
            kept.truncate(params.max_features);
        }
        kept.sort_unstable();

        let n = texts.len() as f64;
        let idf: Vec<f32> = kept
            .iter()
            .map(|term| {
                let df = document_frequency[term] as f64;
                (((1.0 + n) / (1.0 + df)).ln() + 1.0) as f32
            })
            .collect();

        let vocabulary: HashMap<String, u32> = kept
            .iter()
            .enumerate()
            .map(|(column, term)| ((*term).to_string(), column as u32))
            .collect();

        let model = Self {
            vocabulary,
            idf,
            documents: texts.len(),
        };

        let matrix = counts.par_iter().map(|doc| model.weigh(doc)).collect();

        Ok((model, matrix))
    }

    /// Weighs a single text with the fitted vocabulary. Unknown terms are
    /// ignored, so a text of only unseen terms yields an empty row.
    pub fn transform(&self, text: &str) -> SparseRow {
        self.weigh(&count_terms(text))
    }

    /// Number of retained terms (the reduction model's input width).
    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Number of documents the model was fitted on.
    #[must_use]
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Column assigned to `term`, if it survived pruning.
    pub fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    fn weigh(&self, counts: &HashMap<&str, u32>) -> SparseRow {
        let mut row: SparseRow = counts
            .iter()
            .filter_map(|(term, count)| {
                let column = *self.vocabulary.get(*term)?;
                Some((column, *count as f32 * self.idf[column as usize]))
            })
            .collect();
        row.sort_unstable_by_key(|(column, _)| *column);

        let length = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if length > 0.0 {
            row.iter_mut().for_each(|(_, w)| *w /= length);
        }
        row
    }
}

fn count_terms(text: &str) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for token in TOKEN_PATTERN.find_iter(text) {
        *counts.entry(token.as_str()).or_default() += 1;
    }
    counts
}
