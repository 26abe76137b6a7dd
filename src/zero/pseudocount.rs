//! Pseudocount handling before log transformation of proportions.

use crate::error::{ReportError, Result};
use crate::normalize::ProportionMatrix;
use nalgebra::DMatrix;

/// Default pseudocount added to proportions before taking logs.
pub const DEFAULT_PSEUDOCOUNT: f64 = 1e-6;

/// Natural log of proportions after adding a pseudocount.
///
/// Zero proportions map to ln(pseudocount) instead of -inf. Undefined
/// (NaN) columns stay NaN.
///
/// # Arguments
/// * `props` - The proportion matrix
/// * `pseudocount` - Value to add (typically 1e-6 for proportions)
///
/// # Returns
/// A dense taxa × samples matrix of log values.
pub fn log_with_pseudocount(props: &ProportionMatrix, pseudocount: f64) -> Result<DMatrix<f64>> {
    if !(pseudocount > 0.0 && pseudocount.is_finite()) {
        return Err(ReportError::InvalidParameter(
            "Pseudocount must be positive".to_string(),
        ));
    }
    Ok(props.data.map(|p| (p + pseudocount).ln()))
}

/// Describe the response transformation for result tables.
pub fn describe(pseudocount: f64) -> String {
    format!("ln(p + {:e})", pseudocount)
}
