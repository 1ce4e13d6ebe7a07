//! Dense linear algebra helpers shared by the reduction model and the
//! in-memory index.
//!
//! Everything here is plain Rust over `Vec<f64>`/`&[f32]`; the matrices the
//! reduction step decomposes are small (at most `target_dims + oversamples`
//! on a side), so no BLAS backend is needed.

use rayon::prelude::*;

/// Epsilon below which a column is treated as numerically zero.
const EPSILON: f64 = 1e-10;

/// Maximum number of Jacobi sweeps before giving up on convergence.
///
/// A sweep is O(n^3) and runs on one thread since each rotation depends on
/// the previous one. At n = 1010 that is about 4 * 10^9 flops per sweep;
/// well-separated spectra usually converge in under 15 sweeps.
const MAX_JACOBI_SWEEPS: usize = 100;

/// Calculates cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Orthonormalizes `columns` in place with Gram-Schmidt.
///
/// Each column is projected twice against the previous ones, which keeps
/// the basis orthogonal in floating point. Within a pass the projections and
/// the update are computed in parallel. Columns that collapse to zero
/// (linearly dependent input) stay as zero vectors so positions are kept.
pub(crate) fn orthonormalize(columns: &mut [Vec<f64>]) {
    for j in 0..columns.len() {
        let (done, rest) = columns.split_at_mut(j);
        let done: &[Vec<f64>] = done;
        let current = &mut rest[0];

        for _ in 0..2 {
            let projections: Vec<f64> = {
                let current: &[f64] = current;
                done.par_iter()
                    .map(|previous| dot(previous, current))
                    .collect()
            };
            current.par_iter_mut().enumerate().for_each(|(i, c)| {
                *c -= done
                    .iter()
                    .zip(&projections)
                    .map(|(previous, projection)| projection * previous[i])
                    .sum::<f64>();
            });
        }

        let length = norm(current);
        if length > EPSILON {
            current.iter_mut().for_each(|c| *c /= length);
        } else {
            current.iter_mut().for_each(|c| *c = 0.0);
        }
    }
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns `(eigenvalues, eigenvectors)` sorted by descending eigenvalue;
/// `eigenvectors[i]` is the unit eigenvector for `eigenvalues[i]`.
pub(crate) fn symmetric_eigen(matrix: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut row = vec![0.0; n];
            row[i] = 1.0;
            row
        })
        .collect();

    let total: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_JACOBI_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off_diagonal <= total * 1e-22 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }

                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[j][j].total_cmp(&a[i][i]));

    let eigenvalues = order.iter().map(|&i| a[i][i]).collect();
    let eigenvectors = order
        .iter()
        .map(|&i| v.iter().map(|row| row[i]).collect())
        .collect();

    (eigenvalues, eigenvectors)
}
