//! Reduction model: truncated SVD over the sparse term-weight matrix.
//!
//! # Algorithm
//! 1. Randomized range finder: project the matrix onto `width + oversamples`
//!    random directions and orthonormalize
//! 2. Subspace (power) iterations sharpen the basis towards the dominant
//!    singular directions
//! 3. Exact eigen-decomposition of the small projected Gram matrix gives the
//!    right singular vectors
//!
//! Components beyond the numerical rank of the corpus are stored as zero
//! rows, so the output width is always exactly the requested width.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::vector::math::{dot, orthonormalize, symmetric_eigen};
use crate::vector::{SparseRow, VectorDimension};

/// Singular values below this are treated as zero.
const RANK_TOLERANCE: f64 = 1e-8;

/// Parameters for fitting a reduction model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionParams {
    /// Output width of the model.
    pub width: VectorDimension,
    /// Number of subspace iterations.
    pub power_iterations: usize,
    /// Extra random directions sampled beyond `width`.
    pub oversamples: usize,
    /// Seed for the random projection, so fits are reproducible.
    pub seed: u64,
}

/// Fitted linear projection from term-weight space to a dense vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionModel {
    input_width: usize,
    components: Vec<Vec<f32>>,
    singular_values: Vec<f32>,
}

impl ReductionModel {
    /// Fits the projection over `rows`, each a sparse row of `input_width`
    /// columns.
    pub fn fit(rows: &[SparseRow], input_width: usize, params: &ReductionParams) -> Self {
        let width = params.width.get();
        let sample_width = (width + params.oversamples)
            .min(rows.len())
            .min(input_width);

        let mut components = vec![vec![0.0f32; input_width]; width];
        let mut singular_values = vec![0.0f32; width];

        if sample_width == 0 {
            return Self {
                input_width,
                components,
                singular_values,
            };
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut directions: Vec<Vec<f64>> = (0..sample_width)
            .map(|_| {
                (0..input_width)
                    .map(|_| rng.random_range(-1.0..1.0))
                    .collect()
            })
            .collect();

        let mut basis = multiply(rows, &directions);
        orthonormalize(&mut basis);
        for _ in 0..params.power_iterations {
            directions = multiply_transposed(rows, &basis, input_width);
            orthonormalize(&mut directions);
            basis = multiply(rows, &directions);
            orthonormalize(&mut basis);
        }

        // B = Q^T X, one row of length `input_width` per basis column
        let projected = multiply_transposed(rows, &basis, input_width);
        let gram: Vec<Vec<f64>> = projected
            .iter()
            .map(|a| projected.iter().map(|b| dot(a, b)).collect())
            .collect();
        let (eigenvalues, eigenvectors) = symmetric_eigen(&gram);

        for (i, (lambda, weights)) in eigenvalues
            .iter()
            .zip(eigenvectors.iter())
            .take(width)
            .enumerate()
        {
            let sigma = lambda.max(0.0).sqrt();
            if sigma <= RANK_TOLERANCE {
                continue;
            }

            let mut component = vec![0.0f64; input_width];
            for (weight, row) in weights.iter().zip(projected.iter()) {
                for (c, value) in component.iter_mut().zip(row.iter()) {
                    *c += weight * value;
                }
            }

            // Deterministic sign: largest-magnitude entry is positive
            let pivot = component
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

            components[i] = component.iter().map(|c| (sign * c / sigma) as f32).collect();
            singular_values[i] = sigma as f32;
        }

        Self {
            input_width,
            components,
            singular_values,
        }
    }

    /// Projects a sparse term-weight row to a dense vector of
    /// [`output_width`](Self::output_width) values.
    pub fn transform(&self, row: &SparseRow) -> Vec<f32> {
        self.components
            .iter()
            .map(|component| {
                row.iter()
                    .filter(|(column, _)| (*column as usize) < self.input_width)
                    .map(|(column, weight)| weight * component[*column as usize])
                    .sum::<f32>()
            })
            .collect()
    }

    /// Width of the vectors this model produces.
    #[must_use]
    pub fn output_width(&self) -> usize {
        self.components.len()
    }

    /// Width of the term-weight rows this model consumes.
    #[must_use]
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    /// Number of components carrying signal (non-zero singular value).
    #[must_use]
    pub fn effective_rank(&self) -> usize {
        self.singular_values.iter().filter(|s| **s > 0.0).count()
    }

    /// Singular values in descending order, zero past the effective rank.
    #[must_use]
    pub fn singular_values(&self) -> &[f32] {
        &self.singular_values
    }
}

/// `X * v` for every column `v` in `columns`; results have one entry per row.
fn multiply(rows: &[SparseRow], columns: &[Vec<f64>]) -> Vec<Vec<f64>> {
    columns
        .par_iter()
        .map(|column| {
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|(c, w)| f64::from(*w) * column[*c as usize])
                        .sum::<f64>()
                })
                .collect()
        })
        .collect()
}

/// `X^T * u` for every column `u` in `columns`; results have `input_width`
/// entries.
fn multiply_transposed(
    rows: &[SparseRow],
    columns: &[Vec<f64>],
    input_width: usize,
) -> Vec<Vec<f64>> {
    columns
        .par_iter()
        .map(|column| {
            let mut out = vec![0.0f64; input_width];
            for (row, scale) in rows.iter().zip(column.iter()) {
                if *scale == 0.0 {
                    continue;
                }
                for (c, w) in row {
                    out[*c as usize] += f64::from(*w) * scale;
                }
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(width: usize) -> ReductionParams {
        ReductionParams {
            width: VectorDimension::new(width).unwrap(),
            power_iterations: 5,
            oversamples: 10,
            seed: 7,
        }
    }

    fn rows() -> Vec<SparseRow> {
        vec![
            vec![(0, 0.8), (1, 0.6)],
            vec![(0, 0.6), (1, 0.8)],
            vec![(2, 1.0)],
            vec![(2, 0.6), (3, 0.8)],
        ]
    }

    #[test]
    fn test_output_width_matches_requested_width() {
        let model = ReductionModel::fit(&rows(), 4, &params(50));

        assert_eq!(model.output_width(), 50);
        assert_eq!(model.input_width(), 4);
        assert!(model.effective_rank() <= 4);

        let vector = model.transform(&rows()[0]);
        assert_eq!(vector.len(), 50);
        // Components past the rank carry no signal
        assert!(vector[4..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_components_are_orthonormal() {
        let model = ReductionModel::fit(&rows(), 4, &params(3));
        let rank = model.effective_rank();
        assert!(rank >= 2);

        for i in 0..rank {
            let a: Vec<f64> = model.components[i].iter().map(|x| f64::from(*x)).collect();
            assert!((dot(&a, &a) - 1.0).abs() < 1e-4);
            for j in (i + 1)..rank {
                let b: Vec<f64> = model.components[j].iter().map(|x| f64::from(*x)).collect();
                assert!(dot(&a, &b).abs() < 1e-4);
            }
        }

        let values = model.singular_values();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_projection_preserves_norm_of_full_rank_data() {
        // With width >= rank, the projection is an isometry on the row space
        let model = ReductionModel::fit(&rows(), 4, &params(4));
        for row in rows() {
            let original: f32 = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
            let reduced: f32 = model.transform(&row).iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((original - reduced).abs() < 1e-3);
        }
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let a = ReductionModel::fit(&rows(), 4, &params(3));
        let b = ReductionModel::fit(&rows(), 4, &params(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input_yields_zero_model() {
        let model = ReductionModel::fit(&[], 4, &params(8));
        assert_eq!(model.output_width(), 8);
        assert_eq!(model.effective_rank(), 0);
    }
}
