//! Labelled pairwise distance matrix.

use crate::data::index_ids;
use crate::error::{ReportError, Result};
use nalgebra::DMatrix;
use std::collections::HashMap;

/// Relative tolerance for symmetry and zero-diagonal checks on input matrices.
const SYMMETRY_TOL: f64 = 1e-9;

/// A symmetric, zero-diagonal, non-negative distance matrix over samples.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    data: DMatrix<f64>,
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl DistanceMatrix {
    /// Create a distance matrix, validating its invariants.
    ///
    /// Entries that are symmetric only within tolerance are averaged so
    /// that the stored matrix is exactly symmetric.
    pub fn new(data: DMatrix<f64>, ids: Vec<String>) -> Result<Self> {
        let n = ids.len();
        if data.nrows() != data.ncols() {
            return Err(ReportError::InvalidParameter(format!(
                "Distance matrix must be square, got {}x{}",
                data.nrows(),
                data.ncols()
            )));
        }
        if data.nrows() != n {
            return Err(ReportError::DimensionMismatch {
                expected: data.nrows(),
                actual: n,
            });
        }
        let index = index_ids(&ids)?;

        let scale = data.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
        let tol = SYMMETRY_TOL * scale;
        let mut data = data;
        for i in 0..n {
            if data[(i, i)].abs() > tol {
                return Err(ReportError::InvalidParameter(format!(
                    "Non-zero diagonal for '{}'",
                    ids[i]
                )));
            }
            data[(i, i)] = 0.0;
            for j in (i + 1)..n {
                let (a, b) = (data[(i, j)], data[(j, i)]);
                if !a.is_finite() || !b.is_finite() || a < -tol || b < -tol {
                    return Err(ReportError::InvalidParameter(format!(
                        "Invalid distance between '{}' and '{}'",
                        ids[i], ids[j]
                    )));
                }
                if (a - b).abs() > tol {
                    return Err(ReportError::InvalidParameter(format!(
                        "Distance matrix is not symmetric at ('{}', '{}')",
                        ids[i], ids[j]
                    )));
                }
                let d = (0.5 * (a + b)).max(0.0);
                data[(i, j)] = d;
                data[(j, i)] = d;
            }
        }

        Ok(Self { data, ids, index })
    }

    /// Sample identifiers in matrix order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the matrix has no samples.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Distance between positions `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }

    /// Distance between two samples by ID.
    pub fn distance(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.data[(*self.index.get(a)?, *self.index.get(b)?)])
    }

    /// Position of a sample.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Underlying square matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Upper-triangle entries in row-major order (i < j).
    pub fn upper_triangle(&self) -> Vec<f64> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.data[(i, j)]);
            }
        }
        out
    }

    /// Upper triangle of the matrix with rows and columns jointly permuted,
    /// i.e. entry (i, j) is read from (perm[i], perm[j]).
    pub fn permuted_upper_triangle(&self, perm: &[usize]) -> Vec<f64> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.data[(perm[i], perm[j])]);
            }
        }
        out
    }

    /// Restrict (and reorder) the matrix to the given IDs.
    pub fn select(&self, ids: &[String]) -> Result<Self> {
        let positions = ids
            .iter()
            .map(|id| {
                self.position(id).ok_or_else(|| {
                    ReportError::Alignment(format!("Sample '{}' not in distance matrix", id))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        let data = DMatrix::from_fn(ids.len(), ids.len(), |i, j| {
            self.data[(positions[i], positions[j])]
        });
        Self::new(data, ids.to_vec())
    }
}
