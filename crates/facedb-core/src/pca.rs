//! Principal component analysis over face embeddings.
//!
//! Centers the samples, eigendecomposes their covariance with a cyclic
//! Jacobi solver and projects onto the leading components. When there are
//! fewer samples than dimensions (the usual case: a handful of 512-d
//! embeddings per identity) the eigenproblem is solved on the n×n Gram
//! matrix instead, which has the same non-zero spectrum and yields the same
//! projections at a fraction of the cost.

use crate::types::Embedding;
use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

// --- Named constants ---
/// Squared off-diagonal mass (relative to the whole matrix) at which the
/// Jacobi sweeps stop.
const JACOBI_TOLERANCE: f64 = 1e-24;
const JACOBI_MAX_SWEEPS: usize = 100;
/// Eigenvalues at or below this are treated as an empty direction.
const EIGEN_EPSILON: f64 = 1e-12;

#[derive(Error, Debug)]
pub enum PcaError {
    #[error("PCA needs at least 2 samples, got {0}")]
    NotEnoughSamples(usize),
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("n_components must be at least 1")]
    NoComponents,
}

/// A fitted PCA basis plus the projection of the fitting samples.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Per-dimension mean of the fitting samples, shape (d,).
    pub mean: Array1<f64>,
    /// Principal axes as columns, shape (d, k), ordered by descending variance.
    pub components: Array2<f64>,
    /// Sample variance (ddof = 1) along each kept axis, shape (k,).
    pub explained_variance: Array1<f64>,
    /// Fitting samples projected onto the kept axes, shape (n, k).
    pub projected: Array2<f64>,
}

impl Pca {
    /// Fit a PCA basis with `n_components` axes and project `embeddings` onto it.
    ///
    /// `n_components` is capped at the embedding dimension. Axes beyond the
    /// rank of the data are zero columns, so their projections are zero.
    /// Deterministic for identical input order: each axis is sign-normalized
    /// so its largest-magnitude entry is positive.
    pub fn fit(embeddings: &[Embedding], n_components: usize) -> Result<Self, PcaError> {
        if n_components == 0 {
            return Err(PcaError::NoComponents);
        }
        let n = embeddings.len();
        if n < 2 {
            return Err(PcaError::NotEnoughSamples(n));
        }
        let d = embeddings[0].dim();
        let data = to_matrix(embeddings, d)?;

        let mean = data
            .mean_axis(Axis(0))
            .ok_or(PcaError::NotEnoughSamples(n))?;
        let centered = &data - &mean;
        let k = n_components.min(d);

        let mut components = Array2::<f64>::zeros((d, k));
        let mut explained_variance = Array1::<f64>::zeros(k);
        let mut projected = Array2::<f64>::zeros((n, k));

        if n > d {
            // Covariance path: d×d eigenproblem.
            let covariance = centered.t().dot(&centered) / (n - 1) as f64;
            let (values, vectors) = symmetric_eigen(covariance);
            for (j, &idx) in descending_order(&values).iter().take(k).enumerate() {
                if values[idx] <= EIGEN_EPSILON {
                    continue;
                }
                components.column_mut(j).assign(&vectors.column(idx));
                explained_variance[j] = values[idx];
            }
            projected = centered.dot(&components);
        } else {
            // Gram path: n×n eigenproblem. For G u = λ u, the covariance axis
            // is Xᵀu / √λ and the projection of the samples on it is √λ · u.
            let gram = centered.dot(&centered.t());
            let (values, vectors) = symmetric_eigen(gram);
            for (j, &idx) in descending_order(&values).iter().take(k).enumerate() {
                let lambda = values[idx];
                if lambda <= EIGEN_EPSILON {
                    continue;
                }
                let root = lambda.sqrt();
                let u = vectors.column(idx);
                components
                    .column_mut(j)
                    .assign(&(centered.t().dot(&u) / root));
                projected.column_mut(j).assign(&(&u * root));
                explained_variance[j] = lambda / (n - 1) as f64;
            }
        }

        normalize_signs(&mut components, &mut projected);

        tracing::trace!(samples = n, dim = d, components = k, "PCA fitted");

        Ok(Self {
            mean,
            components,
            explained_variance,
            projected,
        })
    }

    /// Project another embedding onto the fitted axes.
    pub fn transform(&self, embedding: &Embedding) -> Result<Array1<f64>, PcaError> {
        let d = self.mean.len();
        if embedding.dim() != d {
            return Err(PcaError::DimensionMismatch {
                expected: d,
                got: embedding.dim(),
            });
        }
        let x: Array1<f64> = embedding.values.iter().map(|v| *v as f64).collect();
        Ok((&x - &self.mean).dot(&self.components))
    }

    /// Population standard deviation (ddof = 0) of the projected samples
    /// along each kept axis.
    pub fn projected_std(&self) -> Array1<f64> {
        self.projected.std_axis(Axis(0), 0.0)
    }
}

fn to_matrix(embeddings: &[Embedding], d: usize) -> Result<Array2<f64>, PcaError> {
    let mut data = Array2::<f64>::zeros((embeddings.len(), d));
    for (i, e) in embeddings.iter().enumerate() {
        if e.dim() != d {
            return Err(PcaError::DimensionMismatch {
                expected: d,
                got: e.dim(),
            });
        }
        for (j, v) in e.values.iter().enumerate() {
            data[[i, j]] = *v as f64;
        }
    }
    Ok(data)
}

/// Indices of `values` sorted by descending value; ties keep index order.
fn descending_order(values: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Flip each axis so its largest-magnitude entry is positive, flipping the
/// matching projection column with it.
fn normalize_signs(components: &mut Array2<f64>, projected: &mut Array2<f64>) {
    for j in 0..components.ncols() {
        let pivot = components
            .column(j)
            .iter()
            .copied()
            .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            components.column_mut(j).mapv_inplace(|v| -v);
            projected.column_mut(j).mapv_inplace(|v| -v);
        }
    }
}

/// Eigendecomposition of a real symmetric matrix by cyclic Jacobi rotations.
///
/// Returns (eigenvalues, eigenvectors as columns), in no particular order.
#[allow(clippy::needless_range_loop)]
fn symmetric_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    let scale: f64 = a.iter().map(|x| x * x).sum();

    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off = 0.0f64;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= JACOBI_TOLERANCE * scale || off == 0.0 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // A ← Jᵀ A J, with J the rotation in the (p, q) plane.
                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
