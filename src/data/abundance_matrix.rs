//! Sparse abundance matrix for taxon (or gene-function) counts.

use crate::data::{index_ids, is_missing_token};
use crate::error::{ReportError, Result};
use nalgebra::DMatrix;
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use std::path::Path;

/// A sparse abundance matrix storing counts across samples.
///
/// Rows represent taxa (or gene functions), columns represent samples.
/// Values are non-negative; integer counts are the common case, but
/// numeric abundances (e.g. predicted gene-function counts) are accepted.
/// Uses CSR (Compressed Sparse Row) format for efficient row-wise operations.
#[derive(Debug, Clone)]
pub struct AbundanceMatrix {
    /// Sparse matrix in CSR format (taxa × samples)
    data: CsMat<f64>,
    /// Taxon identifiers (row names)
    taxon_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
    /// Sample ID -> column index
    sample_index: HashMap<String, usize>,
}

impl AbundanceMatrix {
    /// Create a new AbundanceMatrix from a sparse matrix and identifiers.
    ///
    /// Fails on shape mismatches, duplicate identifiers and negative or
    /// non-finite entries.
    pub fn new(data: CsMat<f64>, taxon_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != taxon_ids.len() {
            return Err(ReportError::DimensionMismatch {
                expected: nrows,
                actual: taxon_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(ReportError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        index_ids(&taxon_ids)?;
        let sample_index = index_ids(&sample_ids)?;

        for (row, row_vec) in data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                if !val.is_finite() || val < 0.0 {
                    return Err(ReportError::InvalidValue {
                        value: val.to_string(),
                        row,
                        col,
                    });
                }
            }
        }

        Ok(Self {
            data,
            taxon_ids,
            sample_ids,
            sample_index,
        })
    }

    /// Build from dense rows (one `Vec` per taxon, one entry per sample).
    pub fn from_rows(
        rows: &[Vec<f64>],
        taxon_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut tri_mat = TriMat::new((rows.len(), n_samples));
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_samples {
                return Err(ReportError::DimensionMismatch {
                    expected: n_samples,
                    actual: values.len(),
                });
            }
            for (col, &val) in values.iter().enumerate() {
                if val != 0.0 {
                    tri_mat.add_triplet(row, col, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), taxon_ids, sample_ids)
    }

    /// Load an abundance matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the taxon ID header)
    /// - Subsequent rows: taxon ID followed by counts
    ///
    /// Missing tokens (`NA`, empty) are read as zero counts.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(false)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(ReportError::EmptyData(
                "Abundance table must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut taxon_ids: Vec<String> = Vec::new();

        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let Some(taxon_id) = record.get(0) else {
                continue;
            };
            taxon_ids.push(taxon_id.trim().to_string());

            for (col_idx, raw) in record.iter().skip(1).enumerate().take(n_samples) {
                if is_missing_token(raw) {
                    continue;
                }
                let value: f64 = raw.trim().parse().map_err(|_| ReportError::InvalidValue {
                    value: raw.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                if value < 0.0 || !value.is_finite() {
                    return Err(ReportError::InvalidValue {
                        value: raw.to_string(),
                        row: row_idx,
                        col: col_idx,
                    });
                }
                if value > 0.0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        if taxon_ids.is_empty() {
            return Err(ReportError::EmptyData("No taxa in abundance table".to_string()));
        }

        let mut tri_mat = TriMat::new((taxon_ids.len(), n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }
        Self::new(tri_mat.to_csr(), taxon_ids, sample_ids)
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data.get(row, col).copied().unwrap_or(0.0)
    }

    /// Number of taxa (rows).
    #[inline]
    pub fn n_taxa(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Taxon identifiers.
    #[inline]
    pub fn taxon_ids(&self) -> &[String] {
        &self.taxon_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column index of a sample.
    pub fn sample_position(&self, sample_id: &str) -> Option<usize> {
        self.sample_index.get(sample_id).copied()
    }

    /// Get a dense vector for a specific row (taxon).
    pub fn row_dense(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Get a dense vector for a specific column (sample).
    pub fn col_dense(&self, col: usize) -> Vec<f64> {
        (0..self.n_taxa()).map(|row| self.get(row, col)).collect()
    }

    /// Compute column sums (library sizes per sample).
    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Convert to a dense matrix (taxa × samples).
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n_taxa(), self.n_samples());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                dense[(row, col)] = val;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_matrix() -> AbundanceMatrix {
        // 3 taxa × 4 samples
        let rows = vec![
            vec![10.0, 20.0, 0.0, 5.0],
            vec![100.0, 200.0, 150.0, 175.0],
            vec![1.0, 0.0, 0.0, 0.0],
        ];
        AbundanceMatrix::from_rows(
            &rows,
            vec!["tax_A".into(), "tax_B".into(), "tax_C".into()],
            vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions_and_values() {
        let mat = create_test_matrix();
        assert_eq!(mat.n_taxa(), 3);
        assert_eq!(mat.n_samples(), 4);
        assert_eq!(mat.get(0, 0), 10.0);
        assert_eq!(mat.get(0, 2), 0.0);
        assert_eq!(mat.get(2, 1), 0.0);
    }

    #[test]
    fn test_sums() {
        let mat = create_test_matrix();
        assert_eq!(mat.col_sums(), vec![111.0, 220.0, 150.0, 180.0]);
    }

    #[test]
    fn test_rejects_negative_counts() {
        let result = AbundanceMatrix::from_rows(
            &[vec![1.0, -2.0]],
            vec!["t".into()],
            vec!["S1".into(), "S2".into()],
        );
        assert!(matches!(result, Err(ReportError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_duplicate_samples() {
        let result = AbundanceMatrix::from_rows(
            &[vec![1.0, 2.0]],
            vec!["t".into()],
            vec!["S1".into(), "S1".into()],
        );
        assert!(matches!(result, Err(ReportError::DuplicateId(_))));
    }

    #[test]
    fn test_from_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "taxon\tS1\tS2\tS3").unwrap();
        writeln!(file, "t1\t10\t0\t5").unwrap();
        writeln!(file, "t2\t1\t2\t3").unwrap();
        file.flush().unwrap();

        let mat = AbundanceMatrix::from_tsv(file.path()).unwrap();
        assert_eq!(mat.taxon_ids(), &["t1", "t2"]);
        assert_eq!(mat.sample_ids(), &["S1", "S2", "S3"]);
        assert_eq!(mat.sample_position("S3"), Some(2));
        assert_eq!(mat.to_dense(), DMatrix::from_row_slice(2, 3, &[10.0, 0.0, 5.0, 1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_from_tsv_missing_tokens_are_zero() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "taxon\tS1\tS2").unwrap();
        writeln!(file, "t1\t3\tNA").unwrap();
        file.flush().unwrap();

        let mat = AbundanceMatrix::from_tsv(file.path()).unwrap();
        assert_eq!(mat.row_dense(0), vec![3.0, 0.0]);
    }
}
