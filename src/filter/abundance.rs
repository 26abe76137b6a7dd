//! Minimum-abundance filtering of taxa.

use crate::error::{ReportError, Result};
use crate::normalize::ProportionMatrix;
use log::debug;
use rayon::prelude::*;

/// Keep taxa whose relative abundance exceeds `min_abundance` in at least
/// one sample.
///
/// NaN entries (undefined samples) never satisfy the threshold.
///
/// # Arguments
/// * `props` - Proportion matrix
/// * `min_abundance` - Threshold in [0, 1)
///
/// # Returns
/// A new ProportionMatrix with only the eligible taxa, in original order.
pub fn filter_min_abundance(props: &ProportionMatrix, min_abundance: f64) -> Result<ProportionMatrix> {
    if !(0.0..1.0).contains(&min_abundance) {
        return Err(ReportError::InvalidParameter(
            "min_abundance must be in [0, 1)".to_string(),
        ));
    }

    let keep_indices: Vec<usize> = (0..props.n_taxa())
        .into_par_iter()
        .filter(|&row| props.data.row(row).iter().any(|&p| p > min_abundance))
        .collect();

    if keep_indices.is_empty() {
        return Err(ReportError::EmptyData(format!(
            "No taxa exceed relative abundance {} in any sample",
            min_abundance
        )));
    }
    debug!(
        "Abundance filter kept {} of {} taxa (threshold {})",
        keep_indices.len(),
        props.n_taxa(),
        min_abundance
    );

    Ok(props.select_taxa(&keep_indices))
}
