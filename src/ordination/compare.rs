//! Concordance between two ordinations of the same samples.
//!
//! PCoA axes are defined up to sign, so two configurations are compared
//! after choosing, per axis, the reflection that minimises the discrepancy.
//! Every one of the 2^k sign patterns over the first k axes is scored.

use super::pcoa::OrdinationResult;
use crate::data::reconcile_ids;
use crate::error::{ReportError, Result};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Upper bound on the number of axes searched over (2^8 candidates).
pub const MAX_REFLECTION_AXES: usize = 8;

/// Result of comparing two ordinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationComparison {
    /// Number of axes compared.
    pub axes: usize,
    /// Per-axis flip applied to the second configuration (true = negated).
    pub flips: Vec<bool>,
    /// Sum of squared differences after scaling and best reflection.
    pub discrepancy: f64,
    /// Discrepancy without any reflection, for reference.
    pub unreflected_discrepancy: f64,
    /// Samples shared by both ordinations, in the first one's order.
    pub sample_ids: Vec<String>,
    /// Number of sign patterns evaluated.
    pub candidates: usize,
}

/// Restrict to the given samples and axes and scale to unit Frobenius norm.
fn scaled_configuration(ord: &OrdinationResult, ids: &[String], axes: usize) -> Result<DMatrix<f64>> {
    let rows: Vec<usize> = ids
        .iter()
        .map(|id| {
            ord.sample_ids
                .iter()
                .position(|s| s == id)
                .ok_or_else(|| ReportError::Alignment(format!("Sample '{}' missing from ordination", id)))
        })
        .collect::<Result<_>>()?;

    let mut config = DMatrix::from_fn(rows.len(), axes, |i, k| ord.coordinates[(rows[i], k)]);
    // Centre each axis on the shared samples before scaling
    for k in 0..axes {
        let mean = config.column(k).mean();
        config.column_mut(k).add_scalar_mut(-mean);
    }
    let norm = config.norm();
    if norm == 0.0 {
        return Err(ReportError::DegenerateInput(
            "Ordination has zero spread on the compared axes".to_string(),
        ));
    }
    Ok(config / norm)
}

fn discrepancy(a: &DMatrix<f64>, b: &DMatrix<f64>, flips: &[bool]) -> f64 {
    let mut ssd = 0.0;
    for (k, &flip) in flips.iter().enumerate() {
        let sign = if flip { -1.0 } else { 1.0 };
        for i in 0..a.nrows() {
            ssd += (a[(i, k)] - sign * b[(i, k)]).powi(2);
        }
    }
    ssd
}

/// Compare two ordinations over their first `axes` axes.
///
/// Samples are matched by identifier; at least three must be shared. The
/// axis count is capped by both ordinations and by [`MAX_REFLECTION_AXES`].
pub fn compare_ordinations(
    first: &OrdinationResult,
    second: &OrdinationResult,
    axes: usize,
) -> Result<OrdinationComparison> {
    if axes == 0 {
        return Err(ReportError::InvalidParameter(
            "Ordination comparison needs at least one axis".to_string(),
        ));
    }
    let axes = axes
        .min(first.n_axes())
        .min(second.n_axes())
        .min(MAX_REFLECTION_AXES);
    if axes == 0 {
        return Err(ReportError::DegenerateInput(
            "An ordination has no positive-eigenvalue axes".to_string(),
        ));
    }

    let sample_ids = reconcile_ids(&first.sample_ids, &second.sample_ids)?;
    if sample_ids.len() < 3 {
        return Err(ReportError::Alignment(format!(
            "Ordination comparison needs at least 3 shared samples, got {}",
            sample_ids.len()
        )));
    }

    let a = scaled_configuration(first, &sample_ids, axes)?;
    let b = scaled_configuration(second, &sample_ids, axes)?;

    let candidates = 1usize << axes;
    let mut best_flips = vec![false; axes];
    let mut best = f64::INFINITY;
    for pattern in 0..candidates {
        let flips: Vec<bool> = (0..axes).map(|k| pattern & (1 << k) != 0).collect();
        let score = discrepancy(&a, &b, &flips);
        if score < best {
            best = score;
            best_flips = flips;
        }
    }
    let unreflected = discrepancy(&a, &b, &vec![false; axes]);

    debug!(
        "Ordination comparison over {} axes and {} samples: discrepancy {:.4} (flips {:?})",
        axes,
        sample_ids.len(),
        best,
        best_flips
    );

    Ok(OrdinationComparison {
        axes,
        flips: best_flips,
        discrepancy: best,
        unreflected_discrepancy: unreflected,
        sample_ids,
        candidates,
    })
}
