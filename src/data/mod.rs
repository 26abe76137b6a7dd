//! Data structures for the report pipeline.

mod abundance_matrix;
mod design_matrix;
mod distance_matrix;
mod feature_matrix;
mod formula;
mod reconcile;
mod result;
mod sample_table;

pub use abundance_matrix::AbundanceMatrix;
pub use design_matrix::{DesignMatrix, INTERCEPT};
pub use distance_matrix::DistanceMatrix;
pub use feature_matrix::{FeatureMatrix, Orientation};
pub use formula::Formula;
pub use reconcile::{
    reconcile, reconcile_distances, reconcile_ids, verify_alignment, Reconciled,
    MIN_COMMON_SAMPLES,
};
pub use result::{
    AnovaRow, AnovaTable, AssociationResult, AssociationTable, PermutationTestResult,
};
pub use sample_table::{SampleTable, Variable, VariableType};

use crate::error::{ReportError, Result};
use std::collections::HashMap;

/// Build an identifier -> position index, rejecting empty or repeated IDs.
pub(crate) fn index_ids(ids: &[String]) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if id.trim().is_empty() {
            return Err(ReportError::InvalidParameter(format!(
                "Empty identifier at position {}",
                i
            )));
        }
        if index.insert(id.clone(), i).is_some() {
            return Err(ReportError::DuplicateId(id.clone()));
        }
    }
    Ok(index)
}

/// Whether a token denotes a missing value in input tables.
pub(crate) fn is_missing_token(raw: &str) -> bool {
    let v = raw.trim();
    v.is_empty() || v.eq_ignore_ascii_case("na") || v.eq_ignore_ascii_case("nan")
}
