//! Alpha diversity: within-sample richness and Shannon index.

use crate::data::{AbundanceMatrix, SampleTable};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Column name for observed richness.
pub const RICHNESS: &str = "richness";
/// Column name for the Shannon index.
pub const SHANNON: &str = "shannon";

/// Per-sample alpha diversity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaDiversity {
    /// Sample identifiers.
    pub sample_ids: Vec<String>,
    /// Number of taxa with a non-zero count.
    pub richness: Vec<f64>,
    /// Shannon index H = -Σ p ln p (NaN for zero-total samples).
    pub shannon: Vec<f64>,
}

impl AlphaDiversity {
    /// Attach any measure the sample table does not already carry.
    ///
    /// Precomputed upstream values win; the join is by sample ID.
    pub fn attach_to(&self, table: SampleTable) -> Result<SampleTable> {
        let mut table = table;
        if !table.has_column(RICHNESS) {
            table = table.with_keyed_continuous(RICHNESS, &self.sample_ids, &self.richness)?;
        }
        if !table.has_column(SHANNON) {
            table = table.with_keyed_continuous(SHANNON, &self.sample_ids, &self.shannon)?;
        }
        Ok(table)
    }
}

/// Shannon index of a count vector (natural log).
pub fn shannon(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return f64::NAN;
    }
    -counts
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| {
            let p = c / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Observed richness of a count vector.
pub fn richness(counts: &[f64]) -> f64 {
    counts.iter().filter(|&&c| c > 0.0).count() as f64
}

/// Compute richness and Shannon index for every sample.
pub fn alpha_diversity(counts: &AbundanceMatrix) -> AlphaDiversity {
    let columns: Vec<Vec<f64>> = (0..counts.n_samples()).map(|j| counts.col_dense(j)).collect();
    AlphaDiversity {
        sample_ids: counts.sample_ids().to_vec(),
        richness: columns.iter().map(|c| richness(c)).collect(),
        shannon: columns.iter().map(|c| shannon(c)).collect(),
    }
}
