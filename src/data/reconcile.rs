//! Identifier reconciliation between tables that are analysed jointly.
//!
//! Nothing downstream may assume two tables share row order. Every joint
//! statistic goes through [`reconcile`] (or [`reconcile_distances`]) and
//! re-checks the result with [`verify_alignment`] before running.

use crate::data::{DistanceMatrix, SampleTable};
use crate::error::{ReportError, Result};
use log::debug;
use std::collections::HashSet;

/// Minimum number of shared samples for a joint computation.
pub const MIN_COMMON_SAMPLES: usize = 2;

/// A distance matrix and sample table restricted to their shared samples,
/// in identical order.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Distance matrix over the shared samples.
    pub distances: DistanceMatrix,
    /// Sample table over the shared samples, in distance-matrix order.
    pub samples: SampleTable,
    /// Samples present only in the distance matrix.
    pub dropped_from_distances: Vec<String>,
    /// Samples present only in the sample table.
    pub dropped_from_samples: Vec<String>,
}

/// Identifiers of `primary` that also occur in `other`, in `primary` order.
///
/// Fails if fewer than [`MIN_COMMON_SAMPLES`] remain.
pub fn reconcile_ids(primary: &[String], other: &[String]) -> Result<Vec<String>> {
    let other_set: HashSet<&str> = other.iter().map(String::as_str).collect();
    let common: Vec<String> = primary
        .iter()
        .filter(|id| other_set.contains(id.as_str()))
        .cloned()
        .collect();
    if common.len() < MIN_COMMON_SAMPLES {
        return Err(ReportError::Alignment(format!(
            "Only {} shared sample(s) between tables ({} vs {}); need at least {}",
            common.len(),
            primary.len(),
            other.len(),
            MIN_COMMON_SAMPLES
        )));
    }
    Ok(common)
}

/// Check that two identifier sequences are identical, element by element.
pub fn verify_alignment(left: &[String], right: &[String]) -> Result<()> {
    if left.len() != right.len() {
        return Err(ReportError::Alignment(format!(
            "Identifier count differs: {} vs {}",
            left.len(),
            right.len()
        )));
    }
    if let Some((pos, (a, b))) = left
        .iter()
        .zip(right.iter())
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        return Err(ReportError::Alignment(format!(
            "Identifier mismatch at position {}: '{}' vs '{}'",
            pos, a, b
        )));
    }
    Ok(())
}

/// Intersect a distance matrix with a sample table and put both in the
/// same order (the distance matrix's).
pub fn reconcile(distances: &DistanceMatrix, samples: &SampleTable) -> Result<Reconciled> {
    let common = reconcile_ids(distances.ids(), samples.sample_ids())?;
    let common_set: HashSet<&str> = common.iter().map(String::as_str).collect();

    let dropped_from_distances: Vec<String> = distances
        .ids()
        .iter()
        .filter(|id| !common_set.contains(id.as_str()))
        .cloned()
        .collect();
    let dropped_from_samples: Vec<String> = samples
        .sample_ids()
        .iter()
        .filter(|id| !common_set.contains(id.as_str()))
        .cloned()
        .collect();
    if !dropped_from_distances.is_empty() || !dropped_from_samples.is_empty() {
        debug!(
            "Reconciled {} samples (dropped {} from distances, {} from sample table)",
            common.len(),
            dropped_from_distances.len(),
            dropped_from_samples.len()
        );
    }

    let distances = distances.select(&common)?;
    let samples = samples.subset_samples(&common)?;
    verify_alignment(distances.ids(), samples.sample_ids())?;

    Ok(Reconciled {
        distances,
        samples,
        dropped_from_distances,
        dropped_from_samples,
    })
}

/// Restrict two distance matrices to their shared samples, in the order of
/// the first.
pub fn reconcile_distances(
    first: &DistanceMatrix,
    second: &DistanceMatrix,
) -> Result<(DistanceMatrix, DistanceMatrix)> {
    let common = reconcile_ids(first.ids(), second.ids())?;
    let a = first.select(&common)?;
    let b = second.select(&common)?;
    verify_alignment(a.ids(), b.ids())?;
    Ok((a, b))
}
