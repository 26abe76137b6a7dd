//! Principal Coordinates Analysis (classical metric MDS).
//!
//! # Algorithm
//!
//! 1. A = -½ D² (element-wise)
//! 2. Gower double-centering: G = J A J with J = I - 11ᵀ/n
//! 3. Symmetric eigendecomposition of G, eigenvalues sorted descending
//! 4. Coordinates on axis k = v_k · sqrt(λ_k) for every positive λ_k
//!
//! Percent variance explained uses the sum of *all* eigenvalues, negative
//! ones included, as denominator. Non-Euclidean dissimilarities such as
//! Bray-Curtis produce negative eigenvalues; they are reported, never used
//! as axes.

use crate::data::DistanceMatrix;
use crate::error::{ReportError, Result};
use log::warn;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Eigenvalues with magnitude below this fraction of the largest are zero.
const EIGEN_REL_TOL: f64 = 1e-8;

/// Summary of one ordination axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisSummary {
    /// 1-based axis number.
    pub axis: usize,
    /// Eigenvalue.
    pub eigenvalue: f64,
    /// Percent of total variation.
    pub percent_explained: f64,
}

/// One sample's position, for plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationPoint {
    /// Sample identifier.
    pub sample_id: String,
    /// Coordinates on the requested axes.
    pub coordinates: Vec<f64>,
}

/// Coordinate series handed to figure rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationSeries {
    /// Axis summaries.
    pub axes: Vec<AxisSummary>,
    /// Per-sample coordinates.
    pub points: Vec<OrdinationPoint>,
    /// Informational notes.
    pub notes: Vec<String>,
}

/// Result of a PCoA.
#[derive(Debug, Clone, Serialize)]
pub struct OrdinationResult {
    /// Sample identifiers (rows of `coordinates`).
    pub sample_ids: Vec<String>,
    /// Coordinates (samples × positive-eigenvalue axes).
    #[serde(skip)]
    pub coordinates: DMatrix<f64>,
    /// All eigenvalues, descending (negative ones included).
    pub eigenvalues: Vec<f64>,
    /// Percent variance explained per retained axis.
    pub percent_explained: Vec<f64>,
    /// Informational notes (negative eigenvalues etc).
    pub notes: Vec<String>,
}

impl OrdinationResult {
    /// Number of retained axes.
    pub fn n_axes(&self) -> usize {
        self.coordinates.ncols()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Whether any eigenvalue was meaningfully negative.
    pub fn has_negative_eigenvalues(&self) -> bool {
        let max = self.eigenvalues.first().copied().unwrap_or(0.0).abs();
        self.eigenvalues.iter().any(|&l| l < -EIGEN_REL_TOL * max)
    }

    /// Copy with the sign of axis `k` flipped.
    pub fn reflected(&self, k: usize) -> Self {
        let mut out = self.clone();
        out.coordinates.column_mut(k).neg_mut();
        out
    }

    /// Plot-ready series over the first `n_axes` axes.
    pub fn series(&self, n_axes: usize) -> OrdinationSeries {
        let k = n_axes.min(self.n_axes());
        OrdinationSeries {
            axes: (0..k)
                .map(|a| AxisSummary {
                    axis: a + 1,
                    eigenvalue: self.eigenvalues[a],
                    percent_explained: self.percent_explained[a],
                })
                .collect(),
            points: self
                .sample_ids
                .iter()
                .enumerate()
                .map(|(i, id)| OrdinationPoint {
                    sample_id: id.clone(),
                    coordinates: (0..k).map(|a| self.coordinates[(i, a)]).collect(),
                })
                .collect(),
            notes: self.notes.clone(),
        }
    }
}

/// Gower-centred matrix G = -½ J D² J.
pub fn gower_centered(distances: &DistanceMatrix) -> DMatrix<f64> {
    let n = distances.len();
    let a = distances.matrix().map(|d| -0.5 * d * d);
    let row_means: Vec<f64> = (0..n).map(|i| a.row(i).mean()).collect();
    let grand_mean = row_means.iter().sum::<f64>() / n as f64;
    // A is symmetric, so column means equal row means
    DMatrix::from_fn(n, n, |i, j| a[(i, j)] - row_means[i] - row_means[j] + grand_mean)
}

/// Run PCoA on a distance matrix.
pub fn pcoa(distances: &DistanceMatrix) -> Result<OrdinationResult> {
    let n = distances.len();
    if n < 3 {
        return Err(ReportError::EmptyData(format!(
            "PCoA needs at least 3 samples, got {}",
            n
        )));
    }

    let g = gower_centered(distances);
    let eigen = SymmetricEigen::new(g);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let eigenvalues: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();

    let max_abs = eigenvalues.iter().fold(0.0_f64, |m, l| m.max(l.abs()));
    if max_abs == 0.0 {
        return Err(ReportError::DegenerateInput(
            "All distances are zero; nothing to ordinate".to_string(),
        ));
    }
    let tol = EIGEN_REL_TOL * max_abs;
    let total: f64 = eigenvalues.iter().sum();

    let retained: Vec<usize> = (0..n).filter(|&k| eigenvalues[k] > tol).collect();
    let mut coordinates = DMatrix::zeros(n, retained.len());
    for (axis, &k) in retained.iter().enumerate() {
        let mut v: Vec<f64> = eigen.eigenvectors.column(order[k]).iter().copied().collect();
        // Deterministic sign: largest-magnitude loading positive
        let pivot = v.iter().copied().fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
        if pivot < 0.0 {
            v.iter_mut().for_each(|x| *x = -*x);
        }
        let scale = eigenvalues[k].sqrt();
        for (i, x) in v.iter().enumerate() {
            coordinates[(i, axis)] = x * scale;
        }
    }
    let percent_explained: Vec<f64> = retained
        .iter()
        .map(|&k| 100.0 * eigenvalues[k] / total)
        .collect();

    let mut notes = Vec::new();
    let negative: Vec<f64> = eigenvalues.iter().copied().filter(|&l| l < -tol).collect();
    if !negative.is_empty() {
        let msg = format!(
            "{} negative eigenvalue(s) (most negative {:.4e}); included in the variance denominator, not used as axes",
            negative.len(),
            negative.iter().copied().fold(0.0, f64::min)
        );
        warn!("PCoA: {}", msg);
        notes.push(msg);
    }

    Ok(OrdinationResult {
        sample_ids: distances.ids().to_vec(),
        coordinates,
        eigenvalues,
        percent_explained,
        notes,
    })
}
