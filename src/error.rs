//! Error types for the microbiome-report library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Identifier sets cannot be reconciled, or are not in matching order.
    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Missing column '{0}' in sample table")]
    MissingColumn(String),

    #[error("Duplicate identifier '{0}'")]
    DuplicateId(String),

    /// Zero-count sample, zero-variance covariate or similar; the affected
    /// entity is excluded from the computation.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Invalid variable type for column '{column}': {reason}")]
    InvalidVariableType { column: String, reason: String },

    #[error("Formula parse error: {0}")]
    FormulaParse(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A report section could not run because an input it depends on failed.
    #[error("Section unavailable: {0}")]
    Section(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Whether this error comes from mismatched identifiers or columns.
    pub fn is_alignment(&self) -> bool {
        matches!(self, ReportError::Alignment(_) | ReportError::MissingColumn(_))
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, ReportError>;
