//! Design matrix construction from a sample table and formula.

use crate::data::{Formula, SampleTable, Variable, VariableType};
use crate::error::{ReportError, Result};
use nalgebra::DMatrix;
use std::collections::HashMap;
use std::ops::Range;

/// Name of the intercept coefficient.
pub const INTERCEPT: &str = "(Intercept)";

/// A design matrix for linear modeling.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// The design matrix (samples × coefficients).
    matrix: DMatrix<f64>,
    /// Names of the coefficients (columns).
    coefficient_names: Vec<String>,
    /// Sample IDs (rows).
    sample_ids: Vec<String>,
    /// Formula term -> its coefficient columns.
    term_columns: Vec<(String, Range<usize>)>,
    /// Reference levels for categorical variables.
    reference_levels: HashMap<String, String>,
}

impl DesignMatrix {
    /// Build a design matrix from a sample table and formula.
    ///
    /// Categorical covariates are treatment-coded against their
    /// alphabetically first level. Every sample must have a value for every
    /// covariate (use [`SampleTable::complete_cases`] first). A covariate
    /// with a single level or zero variance cannot be estimated and is
    /// reported as degenerate input.
    pub fn from_formula(table: &SampleTable, formula: &Formula) -> Result<Self> {
        let sample_ids = table.sample_ids().to_vec();
        let n_samples = sample_ids.len();
        table.require_columns(&formula.variables())?;
        if n_samples == 0 {
            return Err(ReportError::DegenerateInput(
                "No samples left to build a design matrix".to_string(),
            ));
        }

        let mut coefficient_names = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        let mut term_columns = Vec::new();
        let mut reference_levels = HashMap::new();

        if formula.intercept {
            coefficient_names.push(INTERCEPT.to_string());
            columns.push(vec![1.0; n_samples]);
        }

        for var_name in &formula.terms {
            let values = table.column(var_name)?;
            if let Some(pos) = values.iter().position(Variable::is_missing) {
                return Err(ReportError::DegenerateInput(format!(
                    "Sample '{}' has no value for covariate '{}'",
                    sample_ids[pos], var_name
                )));
            }
            let start = columns.len();

            match table.column_type(var_name) {
                Some(VariableType::Continuous) => {
                    let col: Vec<f64> = values
                        .iter()
                        .map(|v| v.as_continuous().unwrap_or(f64::NAN))
                        .collect();
                    let first = col[0];
                    if col.iter().all(|&x| (x - first).abs() <= f64::EPSILON * first.abs().max(1.0)) {
                        return Err(ReportError::DegenerateInput(format!(
                            "Covariate '{}' has zero variance",
                            var_name
                        )));
                    }
                    coefficient_names.push(var_name.clone());
                    columns.push(col);
                }
                Some(VariableType::Categorical) | None => {
                    let levels = table.levels(var_name)?;
                    if levels.len() < 2 {
                        return Err(ReportError::DegenerateInput(format!(
                            "Covariate '{}' has a single level",
                            var_name
                        )));
                    }
                    reference_levels.insert(var_name.clone(), levels[0].clone());

                    for level in &levels {
                        // Without an intercept the reference level keeps its own column
                        if formula.intercept && level == &levels[0] {
                            continue;
                        }
                        coefficient_names.push(format!("{}{}", var_name, level));
                        columns.push(
                            values
                                .iter()
                                .map(|v| if v.as_categorical() == Some(level.as_str()) { 1.0 } else { 0.0 })
                                .collect(),
                        );
                    }
                }
            }
            term_columns.push((var_name.clone(), start..columns.len()));
        }

        let matrix = DMatrix::from_fn(n_samples, columns.len(), |r, c| columns[c][r]);

        Ok(Self {
            matrix,
            coefficient_names,
            sample_ids,
            term_columns,
            reference_levels,
        })
    }

    /// Get the design matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Get coefficient names.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Get sample IDs.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns).
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Formula terms with the coefficient columns each one spans.
    pub fn term_columns(&self) -> &[(String, Range<usize>)] {
        &self.term_columns
    }

    /// Get the reference level for a categorical variable.
    pub fn reference_level(&self, variable: &str) -> Option<&str> {
        self.reference_levels.get(variable).map(String::as_str)
    }

    /// Get the index of a coefficient by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Check if the matrix has an intercept.
    pub fn has_intercept(&self) -> bool {
        self.coefficient_names.first().map(String::as_str) == Some(INTERCEPT)
    }

    /// The first `n_cols` columns, used to build nested (sequential) models.
    pub fn leading_columns(&self, n_cols: usize) -> DMatrix<f64> {
        self.matrix.columns(0, n_cols).into_owned()
    }
}
