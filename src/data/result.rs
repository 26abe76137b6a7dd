//! Result types handed to the rendering collaborators.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One coefficient of one fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationResult {
    /// Tested entity: an alpha-diversity measure name or a taxon ID.
    pub entity: String,
    /// Coefficient name (e.g. `sexM`, `score`).
    pub term: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error of the estimate.
    pub std_error: f64,
    /// t statistic.
    pub statistic: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Benjamini-Hochberg adjusted p-value, when the entity belongs to a
    /// corrected family.
    pub q_value: Option<f64>,
    /// Number of samples the model was fitted on.
    pub n_samples: usize,
}

impl AssociationResult {
    /// Nominal significance (presentation filter, not a correction).
    pub fn is_nominally_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// A table of association results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationTable {
    /// Model formula the results come from.
    pub formula: String,
    /// Response transformation (e.g. `identity`, `ln(p + 1e-6)`).
    pub response: String,
    /// Results, grouped by entity in input order.
    pub results: Vec<AssociationResult>,
    /// Entities excluded from testing, with the reason.
    pub excluded: Vec<(String, String)>,
}

impl AssociationTable {
    /// Number of result rows.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get the result for an entity and term.
    pub fn get(&self, entity: &str, term: &str) -> Option<&AssociationResult> {
        self.results
            .iter()
            .find(|r| r.entity == entity && r.term == term)
    }

    /// All results for one term.
    pub fn for_term(&self, term: &str) -> Vec<&AssociationResult> {
        self.results.iter().filter(|r| r.term == term).collect()
    }

    /// Rows with nominal p below `alpha`, sorted by p-value.
    ///
    /// This is the report-time filter; adjusted p-values were computed over
    /// the full family beforehand.
    pub fn nominally_significant(&self, alpha: f64) -> Vec<&AssociationResult> {
        let mut rows: Vec<_> = self
            .results
            .iter()
            .filter(|r| r.is_nominally_significant(alpha))
            .collect();
        rows.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
        rows
    }

    /// Write results to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "entity\tterm\testimate\tstd_error\tstatistic\tp_value\tq_value\tn_samples")?;
        for r in &self.results {
            let q = r.q_value.map(|q| q.to_string()).unwrap_or_else(|| "NA".to_string());
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                r.entity, r.term, r.estimate, r.std_error, r.statistic, r.p_value, q, r.n_samples
            )?;
        }
        Ok(())
    }
}

/// Outcome of a permutation test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationTestResult {
    /// Name of the statistic (e.g. `pearson_r`).
    pub statistic_name: String,
    /// Observed statistic.
    pub statistic: f64,
    /// Empirical p-value, in [1/(N+1), 1].
    pub p_value: f64,
    /// Number of permutations N.
    pub n_permutations: usize,
    /// Number of permuted statistics at least as extreme as observed.
    pub n_extreme: usize,
    /// Number of samples.
    pub n_samples: usize,
    /// Informational notes (e.g. low power).
    pub notes: Vec<String>,
}

/// One row of a pseudo-ANOVA table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnovaRow {
    /// Term name, `Residual` or `Total`.
    pub term: String,
    /// Degrees of freedom.
    pub df: usize,
    /// Sum of squared distances attributed to the row.
    pub sum_of_squares: f64,
    /// Proportion of total sum of squares.
    pub r_squared: f64,
    /// Pseudo-F (terms only).
    pub f_statistic: Option<f64>,
    /// Permutation p-value (terms only).
    pub p_value: Option<f64>,
}

/// Pseudo-ANOVA (distance-matrix regression) table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnovaTable {
    /// Model formula.
    pub formula: String,
    /// Term rows followed by `Residual` and `Total`.
    pub rows: Vec<AnovaRow>,
    /// Number of permutations.
    pub n_permutations: usize,
    /// Number of samples.
    pub n_samples: usize,
    /// Informational notes.
    pub notes: Vec<String>,
}

impl AnovaTable {
    /// Row for a term (or `Residual` / `Total`).
    pub fn row(&self, term: &str) -> Option<&AnovaRow> {
        self.rows.iter().find(|r| r.term == term)
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "term\tdf\tsum_of_squares\tr_squared\tf_statistic\tp_value")?;
        for r in &self.rows {
            let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_else(|| "NA".to_string());
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}",
                r.term,
                r.df,
                r.sum_of_squares,
                r.r_squared,
                opt(r.f_statistic),
                opt(r.p_value)
            )?;
        }
        Ok(())
    }
}
