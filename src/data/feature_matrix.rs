//! Dense per-sample feature vectors used as input to distance computation.

use crate::data::{index_ids, is_missing_token};
use crate::error::{ReportError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layout of a feature table on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// One row per sample, one column per feature.
    SamplesAsRows,
    /// One row per feature, one column per sample.
    SamplesAsColumns,
}

/// Samples × features numeric matrix.
///
/// Used both for taxon proportions (transposed) and for the imaging
/// feature domain, whose values need not be non-negative.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    data: DMatrix<f64>,
    sample_ids: Vec<String>,
    feature_ids: Vec<String>,
}

impl FeatureMatrix {
    /// Create from a samples × features matrix.
    pub fn new(data: DMatrix<f64>, sample_ids: Vec<String>, feature_ids: Vec<String>) -> Result<Self> {
        if data.nrows() != sample_ids.len() {
            return Err(ReportError::DimensionMismatch {
                expected: data.nrows(),
                actual: sample_ids.len(),
            });
        }
        if data.ncols() != feature_ids.len() {
            return Err(ReportError::DimensionMismatch {
                expected: data.ncols(),
                actual: feature_ids.len(),
            });
        }
        index_ids(&sample_ids)?;
        index_ids(&feature_ids)?;
        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            // nalgebra is column-major
            let (row, col) = (pos % data.nrows(), pos / data.nrows());
            return Err(ReportError::DegenerateInput(format!(
                "Non-finite value for sample '{}', feature '{}'",
                sample_ids[row], feature_ids[col]
            )));
        }
        Ok(Self {
            data,
            sample_ids,
            feature_ids,
        })
    }

    /// Load a feature table from a TSV file.
    ///
    /// The first column holds row identifiers and the header holds column
    /// identifiers. Which of them are samples is given by `orientation`.
    /// Missing values are rejected: distance metrics are undefined over them.
    pub fn from_tsv<P: AsRef<Path>>(path: P, orientation: Orientation) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        let col_ids: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();
        if col_ids.is_empty() {
            return Err(ReportError::EmptyData("Feature table has no columns".to_string()));
        }

        let mut row_ids = Vec::new();
        let mut values = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            row_ids.push(record.get(0).unwrap_or("").trim().to_string());
            for (col_idx, raw) in record.iter().skip(1).enumerate() {
                if is_missing_token(raw) {
                    return Err(ReportError::InvalidValue {
                        value: raw.to_string(),
                        row: row_idx,
                        col: col_idx,
                    });
                }
                let v: f64 = raw.trim().parse().map_err(|_| ReportError::InvalidValue {
                    value: raw.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                values.push(v);
            }
        }
        if row_ids.is_empty() {
            return Err(ReportError::EmptyData("Feature table has no rows".to_string()));
        }

        let table = DMatrix::from_row_slice(row_ids.len(), col_ids.len(), &values);
        match orientation {
            Orientation::SamplesAsRows => Self::new(table, row_ids, col_ids),
            Orientation::SamplesAsColumns => Self::new(table.transpose(), col_ids, row_ids),
        }
    }

    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of features (columns).
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Sample identifiers.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Feature identifiers.
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Feature vector of one sample.
    pub fn sample(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().copied().collect()
    }

    /// Underlying samples × features matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }
}
