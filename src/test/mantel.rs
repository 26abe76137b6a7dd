//! Mantel test: concordance between two distance matrices.

use super::permutation::{count_extreme, empirical_p_value, power_notes, run_replicates, PermutationConfig};
use crate::data::{verify_alignment, DistanceMatrix, PermutationTestResult};
use crate::error::{ReportError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Correlation used between upper-triangle entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MantelMethod {
    /// Pearson product-moment correlation.
    Pearson,
    /// Pearson correlation of average ranks.
    Spearman,
}

impl MantelMethod {
    /// Name of the statistic.
    pub fn statistic_name(&self) -> &'static str {
        match self {
            Self::Pearson => "mantel_r_pearson",
            Self::Spearman => "mantel_r_spearman",
        }
    }

    fn prepare(&self, values: Vec<f64>) -> Vec<f64> {
        match self {
            Self::Pearson => values,
            Self::Spearman => average_ranks(&values),
        }
    }
}

/// 1-based ranks, ties sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Centre a vector and scale it to unit norm; `None` if it is constant.
fn standardize(values: &[f64]) -> Option<Vec<f64>> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let centred: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let norm = centred.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }
    Some(centred.into_iter().map(|v| v / norm).collect())
}

/// Pearson correlation of two equal-length vectors (NaN if either is constant).
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    match (standardize(x), standardize(y)) {
        (Some(a), Some(b)) => a.iter().zip(&b).map(|(p, q)| p * q).sum(),
        _ => f64::NAN,
    }
}

/// Mantel test between two distance matrices over the same samples.
///
/// The matrices must already share IDs in the same order (see
/// [`crate::data::reconcile_distances`]). Rows and columns of `second` are
/// permuted jointly; the p-value is one-sided (r* ≥ r).
pub fn mantel(
    first: &DistanceMatrix,
    second: &DistanceMatrix,
    method: MantelMethod,
    config: &PermutationConfig,
) -> Result<PermutationTestResult> {
    config.validate()?;
    verify_alignment(first.ids(), second.ids())?;

    let n = first.len();
    if n < 3 {
        return Err(ReportError::EmptyData(format!(
            "Mantel test needs at least 3 samples, got {}",
            n
        )));
    }

    let x = standardize(&method.prepare(first.upper_triangle())).ok_or_else(|| {
        ReportError::DegenerateInput("First distance matrix has constant off-diagonal entries".to_string())
    })?;
    let correlate = |y: Vec<f64>| -> f64 {
        match standardize(&method.prepare(y)) {
            Some(b) => x.iter().zip(&b).map(|(p, q)| p * q).sum(),
            None => f64::NAN,
        }
    };

    let statistic = correlate(second.upper_triangle());
    if statistic.is_nan() {
        return Err(ReportError::DegenerateInput(
            "Second distance matrix has constant off-diagonal entries".to_string(),
        ));
    }

    let permuted = run_replicates(n, config, |perm| correlate(second.permuted_upper_triangle(perm)));
    let n_extreme = count_extreme(statistic, &permuted);
    let p_value = empirical_p_value(n_extreme, config.n_permutations);

    let notes = power_notes(n, config.n_permutations);
    for note in &notes {
        warn!("Mantel: {}", note);
    }
    info!(
        "Mantel ({:?}) on {} samples: r = {:.4}, p = {:.4}",
        method, n, statistic, p_value
    );

    Ok(PermutationTestResult {
        statistic_name: method.statistic_name().to_string(),
        statistic,
        p_value,
        n_permutations: config.n_permutations,
        n_extreme,
        n_samples: n,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversity::{euclidean, manhattan};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn from_points(points: &[[f64; 2]], metric: fn(&[f64], &[f64]) -> f64) -> DistanceMatrix {
        let n = points.len();
        let data = DMatrix::from_fn(n, n, |i, j| metric(&points[i], &points[j]));
        DistanceMatrix::new(data, (0..n).map(|i| format!("S{}", i)).collect()).unwrap()
    }

    fn points() -> Vec<[f64; 2]> {
        (0..12)
            .map(|i| {
                let t = i as f64;
                [t * 0.9 + (t * 1.3).sin(), (t * 0.4).cos() * 2.0]
            })
            .collect()
    }

    fn config() -> PermutationConfig {
        PermutationConfig { n_permutations: 199, seed: 1, parallel: true }
    }

    #[test]
    fn test_average_ranks() {
        assert_eq!(average_ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
        assert_eq!(average_ranks(&[1.0, 2.0, 2.0, 5.0]), vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn test_pearson() {
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0, epsilon = 1e-12);
        assert!(pearson(&[1.0, 1.0], &[1.0, 2.0]).is_nan());
    }

    #[test]
    fn test_identical_matrices() {
        let dm = from_points(&points(), euclidean);
        let result = mantel(&dm, &dm, MantelMethod::Pearson, &config()).unwrap();
        assert_relative_eq!(result.statistic, 1.0, epsilon = 1e-12);
        assert!(result.p_value <= 0.05);
        assert!(result.p_value >= 1.0 / 200.0);
        assert_eq!(result.statistic_name, "mantel_r_pearson");
    }

    #[test]
    fn test_related_metrics_concordant() {
        let a = from_points(&points(), euclidean);
        let b = from_points(&points(), manhattan);
        let result = mantel(&a, &b, MantelMethod::Spearman, &config()).unwrap();
        assert!(result.statistic > 0.8);
        assert!(result.p_value < 0.05);
    }

    #[test]
    fn test_p_value_bounds_and_reproducibility() {
        let a = from_points(&points(), euclidean);
        let shuffled: Vec<[f64; 2]> = points().iter().rev().map(|p| [p[1], -p[0]]).collect();
        let b = from_points(&shuffled, euclidean);
        let r1 = mantel(&a, &b, MantelMethod::Pearson, &config()).unwrap();
        let serial = PermutationConfig { parallel: false, ..config() };
        let r2 = mantel(&a, &b, MantelMethod::Pearson, &serial).unwrap();

        assert!(r1.p_value >= 1.0 / 200.0 && r1.p_value <= 1.0);
        assert_eq!(r1.p_value, r2.p_value);
        assert_eq!(r1.n_extreme, r2.n_extreme);
    }

    #[test]
    fn test_misaligned_ids_rejected() {
        let a = from_points(&points(), euclidean);
        let order: Vec<String> = a.ids().iter().rev().cloned().collect();
        let b = a.select(&order).unwrap();
        assert!(mantel(&a, &b, MantelMethod::Pearson, &config()).unwrap_err().is_alignment());
    }
}
