//! Sample metadata: covariates and alpha-diversity scalars keyed by sample ID.

use crate::data::{index_ids, is_missing_token};
use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// A single cell of the sample table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with a string level.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }
}

/// Column type of the sample table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

/// Per-sample metadata.
///
/// Columns are stored in sample order next to an ID -> row index, so joins
/// against other tables always go through the index instead of assuming
/// that two tables share row order.
#[derive(Debug, Clone)]
pub struct SampleTable {
    sample_ids: Vec<String>,
    index: HashMap<String, usize>,
    column_names: Vec<String>,
    columns: HashMap<String, Vec<Variable>>,
    column_types: HashMap<String, VariableType>,
}

impl SampleTable {
    /// Create a table with the given sample IDs and no columns.
    ///
    /// Sample IDs must be unique and non-empty.
    pub fn new(sample_ids: Vec<String>) -> Result<Self> {
        let index = index_ids(&sample_ids)?;
        Ok(Self {
            sample_ids,
            index,
            column_names: Vec::new(),
            columns: HashMap::new(),
            column_types: HashMap::new(),
        })
    }

    /// Load a sample table from a TSV file.
    ///
    /// The first column holds sample IDs. A column is continuous if every
    /// non-missing value parses as a number, otherwise categorical.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(ReportError::EmptyData(
                "Sample table must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();

        let mut sample_ids = Vec::new();
        let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); column_names.len()];
        for record in reader.records() {
            let record = record?;
            let Some(id) = record.get(0) else {
                continue;
            };
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            sample_ids.push(id.trim().to_string());
            for (col_idx, column) in raw_columns.iter_mut().enumerate() {
                column.push(record.get(col_idx + 1).unwrap_or("").to_string());
            }
        }

        if sample_ids.is_empty() {
            return Err(ReportError::EmptyData("No samples in sample table".to_string()));
        }

        let mut table = Self::new(sample_ids)?;
        for (name, raw) in column_names.into_iter().zip(raw_columns) {
            table = table.with_raw_column(&name, &raw)?;
        }
        Ok(table)
    }

    /// Add a column parsed from raw strings, inferring its type.
    pub fn with_raw_column(self, name: &str, raw: &[String]) -> Result<Self> {
        let all_numeric = raw
            .iter()
            .all(|v| is_missing_token(v) || v.trim().parse::<f64>().is_ok());
        let values: Vec<Variable> = raw
            .iter()
            .map(|v| {
                if is_missing_token(v) {
                    Variable::Missing
                } else if all_numeric {
                    v.trim()
                        .parse::<f64>()
                        .map(Variable::Continuous)
                        .unwrap_or(Variable::Missing)
                } else {
                    Variable::Categorical(v.trim().to_string())
                }
            })
            .collect();
        let var_type = if all_numeric {
            VariableType::Continuous
        } else {
            VariableType::Categorical
        };
        self.with_column(name, values, var_type)
    }

    /// Add (or replace) a typed column. Values are in sample order.
    pub fn with_column(
        mut self,
        name: &str,
        values: Vec<Variable>,
        var_type: VariableType,
    ) -> Result<Self> {
        if values.len() != self.sample_ids.len() {
            return Err(ReportError::DimensionMismatch {
                expected: self.sample_ids.len(),
                actual: values.len(),
            });
        }
        for v in &values {
            let ok = match (v, var_type) {
                (Variable::Missing, _) => true,
                (Variable::Categorical(_), VariableType::Categorical) => true,
                (Variable::Continuous(x), VariableType::Continuous) => x.is_finite(),
                _ => false,
            };
            if !ok {
                return Err(ReportError::InvalidVariableType {
                    column: name.to_string(),
                    reason: format!("value {:?} does not match {:?}", v, var_type),
                });
            }
        }
        if !self.columns.contains_key(name) {
            self.column_names.push(name.to_string());
        }
        self.columns.insert(name.to_string(), values);
        self.column_types.insert(name.to_string(), var_type);
        Ok(self)
    }

    /// Add a continuous column; NaN values are stored as missing.
    pub fn with_continuous(self, name: &str, values: &[f64]) -> Result<Self> {
        let values = values
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    Variable::Missing
                } else {
                    Variable::Continuous(v)
                }
            })
            .collect();
        self.with_column(name, values, VariableType::Continuous)
    }

    /// Add a categorical column.
    pub fn with_categorical<S: AsRef<str>>(self, name: &str, values: &[S]) -> Result<Self> {
        let values = values
            .iter()
            .map(|v| Variable::Categorical(v.as_ref().to_string()))
            .collect();
        self.with_column(name, values, VariableType::Categorical)
    }

    /// Re-type a column, e.g. force a numeric code to be categorical.
    pub fn with_column_type(self, name: &str, var_type: VariableType) -> Result<Self> {
        let values = self.column(name)?.to_vec();
        if self.column_type(name) == Some(var_type) {
            return Ok(self);
        }
        let converted = values
            .into_iter()
            .map(|v| match (v, var_type) {
                (Variable::Continuous(x), VariableType::Categorical) => {
                    Variable::Categorical(x.to_string())
                }
                (Variable::Categorical(s), VariableType::Continuous) => s
                    .trim()
                    .parse::<f64>()
                    .map(Variable::Continuous)
                    .unwrap_or(Variable::Missing),
                (v, _) => v,
            })
            .collect();
        self.with_column(name, converted, var_type)
    }

    /// Join per-sample values keyed by ID as a continuous column.
    ///
    /// Samples absent from `values` get a missing value.
    pub fn with_keyed_continuous(self, name: &str, ids: &[String], values: &[f64]) -> Result<Self> {
        if ids.len() != values.len() {
            return Err(ReportError::DimensionMismatch {
                expected: ids.len(),
                actual: values.len(),
            });
        }
        let lookup: HashMap<&str, f64> = ids
            .iter()
            .map(String::as_str)
            .zip(values.iter().copied())
            .collect();
        let column: Vec<f64> = self
            .sample_ids
            .iter()
            .map(|id| lookup.get(id.as_str()).copied().unwrap_or(f64::NAN))
            .collect();
        self.with_continuous(name, &column)
    }

    /// Sample IDs in row order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Row index of a sample.
    pub fn position(&self, sample_id: &str) -> Option<usize> {
        self.index.get(sample_id).copied()
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Fail with `MissingColumn` unless every named column is present.
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(ReportError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Get all values for a column, in sample order.
    pub fn column(&self, column: &str) -> Result<&[Variable]> {
        self.columns
            .get(column)
            .map(Vec::as_slice)
            .ok_or_else(|| ReportError::MissingColumn(column.to_string()))
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Get a value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        let row = self.position(sample_id)?;
        self.columns.get(column).map(|c| &c[row])
    }

    /// Continuous column as floats, NaN for missing.
    pub fn continuous(&self, column: &str) -> Result<Vec<f64>> {
        if self.column_type(column) != Some(VariableType::Continuous) {
            return Err(ReportError::InvalidVariableType {
                column: column.to_string(),
                reason: "expected a continuous column".to_string(),
            });
        }
        Ok(self
            .column(column)?
            .iter()
            .map(|v| v.as_continuous().unwrap_or(f64::NAN))
            .collect())
    }

    /// Sorted unique levels of a categorical column.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        Ok(self.group_counts(column)?.into_keys().collect())
    }

    /// Number of samples per level of a categorical column (missing excluded).
    pub fn group_counts(&self, column: &str) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for v in self.column(column)? {
            if let Some(level) = v.as_categorical() {
                *counts.entry(level.to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Samples with no missing value in any of the named columns.
    pub fn complete_cases(&self, columns: &[&str]) -> Result<Vec<String>> {
        let cols = columns
            .iter()
            .map(|c| self.column(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(self
            .sample_ids
            .iter()
            .enumerate()
            .filter(|(row, _)| cols.iter().all(|c| !c[*row].is_missing()))
            .map(|(_, id)| id.clone())
            .collect())
    }

    /// Subset (and reorder) the table to the given samples.
    ///
    /// Fails with an alignment error if a requested sample is unknown.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let rows = sample_ids
            .iter()
            .map(|id| {
                self.position(id).ok_or_else(|| {
                    ReportError::Alignment(format!("Sample '{}' not found in sample table", id))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), rows.iter().map(|&r| values[r].clone()).collect()))
            .collect();

        Ok(Self {
            sample_ids: sample_ids.to_vec(),
            index: index_ids(sample_ids)?,
            column_names: self.column_names.clone(),
            columns,
            column_types: self.column_types.clone(),
        })
    }
}
