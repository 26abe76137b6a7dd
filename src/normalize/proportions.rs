//! Conversion of counts to within-sample relative proportions.
//!
//! Each count is divided by the total count of its sample, so every column
//! of the result sums to one. Samples with a zero total have no defined
//! composition; their column is NaN and must be dropped before use.

use crate::data::{AbundanceMatrix, FeatureMatrix};
use crate::error::{ReportError, Result};
use log::warn;
use nalgebra::DMatrix;
use serde::Serialize;

/// Relative abundances (taxa × samples).
#[derive(Debug, Clone, Serialize)]
pub struct ProportionMatrix {
    /// Proportions (taxa × samples). Zero-total columns are NaN.
    #[serde(skip)]
    pub data: DMatrix<f64>,
    /// Taxon identifiers.
    pub taxon_ids: Vec<String>,
    /// Sample identifiers.
    pub sample_ids: Vec<String>,
    /// Total counts per sample before normalization.
    pub library_sizes: Vec<f64>,
}

impl ProportionMatrix {
    /// Get the proportion for a taxon and sample.
    pub fn get(&self, taxon: usize, sample: usize) -> f64 {
        self.data[(taxon, sample)]
    }

    /// Number of taxa.
    pub fn n_taxa(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Get a row (taxon) as a vector.
    pub fn row(&self, taxon: usize) -> Vec<f64> {
        self.data.row(taxon).iter().copied().collect()
    }

    /// Get a column (sample) as a vector.
    pub fn col(&self, sample: usize) -> Vec<f64> {
        self.data.column(sample).iter().copied().collect()
    }

    /// Samples whose total count was zero (undefined columns).
    pub fn empty_samples(&self) -> Vec<String> {
        self.library_sizes
            .iter()
            .zip(&self.sample_ids)
            .filter(|(&size, _)| size <= 0.0)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Restrict to the given samples, in the given order.
    pub fn select_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let cols = sample_ids
            .iter()
            .map(|id| {
                self.sample_ids.iter().position(|s| s == id).ok_or_else(|| {
                    ReportError::Alignment(format!("Sample '{}' not in proportion matrix", id))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(Self {
            data: self.data.select_columns(cols.iter()),
            taxon_ids: self.taxon_ids.clone(),
            sample_ids: sample_ids.to_vec(),
            library_sizes: cols.iter().map(|&c| self.library_sizes[c]).collect(),
        })
    }

    /// Restrict to the given taxa (by index), keeping their order.
    pub fn select_taxa(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select_rows(indices.iter()),
            taxon_ids: indices.iter().map(|&i| self.taxon_ids[i].clone()).collect(),
            sample_ids: self.sample_ids.clone(),
            library_sizes: self.library_sizes.clone(),
        }
    }

    /// Drop samples with an undefined (zero-total) composition.
    ///
    /// Each dropped sample is logged; fails if no sample remains.
    pub fn drop_empty_samples(&self) -> Result<Self> {
        let empty = self.empty_samples();
        if empty.is_empty() {
            return Ok(self.clone());
        }
        for id in &empty {
            warn!("Sample '{}' has zero total count; excluded", id);
        }
        let keep: Vec<String> = self
            .sample_ids
            .iter()
            .filter(|id| !empty.contains(id))
            .cloned()
            .collect();
        if keep.is_empty() {
            return Err(ReportError::EmptyData(
                "Every sample has zero total count".to_string(),
            ));
        }
        self.select_samples(&keep)
    }

    /// Transpose into a samples × taxa feature matrix for distance input.
    ///
    /// Fails if any column is undefined.
    pub fn to_features(&self) -> Result<FeatureMatrix> {
        if let Some(id) = self.empty_samples().first() {
            return Err(ReportError::DegenerateInput(format!(
                "Sample '{}' has an undefined composition",
                id
            )));
        }
        FeatureMatrix::new(
            self.data.transpose(),
            self.sample_ids.clone(),
            self.taxon_ids.clone(),
        )
    }
}

/// Convert an abundance matrix to proportions.
///
/// # Formula
/// For sample j: p_ij = x_ij / Σ_i x_ij
///
/// Zero-total samples are not an error here: their column is NaN and is
/// listed by [`ProportionMatrix::empty_samples`].
pub fn proportions(counts: &AbundanceMatrix) -> Result<ProportionMatrix> {
    let n_taxa = counts.n_taxa();
    let n_samples = counts.n_samples();
    if n_taxa == 0 || n_samples == 0 {
        return Err(ReportError::EmptyData(
            "Cannot compute proportions of an empty matrix".to_string(),
        ));
    }

    let library_sizes = counts.col_sums();
    let mut data = counts.to_dense();
    for (j, &total) in library_sizes.iter().enumerate() {
        let mut column = data.column_mut(j);
        if total > 0.0 {
            column /= total;
        } else {
            column.fill(f64::NAN);
        }
    }

    Ok(ProportionMatrix {
        data,
        taxon_ids: counts.taxon_ids().to_vec(),
        sample_ids: counts.sample_ids().to_vec(),
        library_sizes,
    })
}
