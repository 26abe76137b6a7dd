//! Beta diversity: pairwise dissimilarities between samples.

use crate::data::{DistanceMatrix, FeatureMatrix};
use crate::error::{ReportError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Dissimilarity measure between two feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    /// Σ|x - y| / Σ(x + y); requires non-negative features.
    BrayCurtis,
    /// Presence/absence dissimilarity ignoring shared absences.
    Jaccard,
    /// Σ|x - y|.
    Manhattan,
    /// sqrt(Σ(x - y)²).
    Euclidean,
}

impl DistanceMethod {
    /// Short name used in logs and output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BrayCurtis => "bray_curtis",
            Self::Jaccard => "jaccard",
            Self::Manhattan => "manhattan",
            Self::Euclidean => "euclidean",
        }
    }

    /// Whether the method is only defined for non-negative features.
    pub fn requires_non_negative(&self) -> bool {
        matches!(self, Self::BrayCurtis | Self::Jaccard)
    }

    /// Distance between two vectors of equal length.
    pub fn distance(&self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            Self::BrayCurtis => bray_curtis(x, y),
            Self::Jaccard => jaccard(x, y),
            Self::Manhattan => manhattan(x, y),
            Self::Euclidean => euclidean(x, y),
        }
    }
}

/// Bray-Curtis dissimilarity in [0, 1]. Two all-zero samples are identical.
pub fn bray_curtis(x: &[f64], y: &[f64]) -> f64 {
    let (diff, total) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(d, t), (a, b)| (d + (a - b).abs(), t + a + b));
    if total > 0.0 {
        diff / total
    } else {
        0.0
    }
}

/// Binary Jaccard dissimilarity: features present in exactly one sample over
/// features present in either. Two samples with no features are identical.
pub fn jaccard(x: &[f64], y: &[f64]) -> f64 {
    let (either, only_one) = x.iter().zip(y).fold((0usize, 0usize), |(e, o), (a, b)| {
        let (pa, pb) = (*a > 0.0, *b > 0.0);
        (e + usize::from(pa || pb), o + usize::from(pa != pb))
    });
    if either > 0 {
        only_one as f64 / either as f64
    } else {
        0.0
    }
}

/// Manhattan (L1) distance.
pub fn manhattan(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum()
}

/// Euclidean (L2) distance.
pub fn euclidean(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt()
}

/// Compute the distance matrix over all samples of a feature matrix.
///
/// Only the upper triangle is computed; the result is exactly symmetric
/// with a zero diagonal.
pub fn beta_diversity(features: &FeatureMatrix, method: DistanceMethod) -> Result<DistanceMatrix> {
    let n = features.n_samples();
    if n < 2 {
        return Err(ReportError::EmptyData(
            "Beta diversity needs at least two samples".to_string(),
        ));
    }
    if method.requires_non_negative() && features.matrix().iter().any(|&v| v < 0.0) {
        return Err(ReportError::InvalidParameter(format!(
            "{} requires non-negative features",
            method.name()
        )));
    }

    let rows: Vec<Vec<f64>> = (0..n).map(|i| features.sample(i)).collect();
    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| method.distance(&rows[i], &rows[j]))
                .collect()
        })
        .collect();

    let mut data = DMatrix::zeros(n, n);
    for (i, row) in upper.iter().enumerate() {
        for (offset, &d) in row.iter().enumerate() {
            let j = i + 1 + offset;
            data[(i, j)] = d;
            data[(j, i)] = d;
        }
    }

    DistanceMatrix::new(data, features.sample_ids().to_vec())
}
