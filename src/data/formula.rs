//! Right-hand-side model formulas (`~ sex + score`).

use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};

/// A parsed additive model formula.
///
/// Supports R-style main-effects syntax:
/// - `~ sex` - intercept + sex
/// - `~ sex + score` - intercept + sex + score
/// - `~ 0 + sex` - no intercept
///
/// Interactions are not part of the report's models and are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    /// Whether to include an intercept.
    pub intercept: bool,
    /// Covariate names, in model order.
    pub terms: Vec<String>,
}

impl Formula {
    /// Parse a formula string.
    ///
    /// # Examples
    /// ```
    /// use microbiome_report::data::Formula;
    /// let f = Formula::parse("~ sex + score").unwrap();
    /// assert!(f.intercept);
    /// assert_eq!(f.terms, vec!["sex", "score"]);
    /// ```
    pub fn parse(formula: &str) -> Result<Self> {
        let formula = formula.trim();
        let rhs = formula
            .strip_prefix('~')
            .ok_or_else(|| ReportError::FormulaParse("Formula must start with '~'".to_string()))?
            .trim();
        if rhs.is_empty() {
            return Err(ReportError::FormulaParse(
                "Formula right-hand side is empty".to_string(),
            ));
        }

        let mut intercept = true;
        let mut terms = Vec::new();
        for raw in rhs.split('+').map(str::trim) {
            match raw {
                "" => {
                    return Err(ReportError::FormulaParse(format!(
                        "Empty term in formula '{}'",
                        formula
                    )))
                }
                "1" => {}
                "0" | "-1" => intercept = false,
                t if t.contains(|c: char| "*:()|-".contains(c)) => {
                    return Err(ReportError::FormulaParse(format!(
                        "Unsupported term '{}': only additive main effects are allowed",
                        t
                    )))
                }
                t => {
                    if terms.iter().any(|existing| existing == t) {
                        return Err(ReportError::FormulaParse(format!(
                            "Term '{}' appears twice",
                            t
                        )));
                    }
                    terms.push(t.to_string());
                }
            }
        }

        if terms.is_empty() && !intercept {
            return Err(ReportError::FormulaParse(
                "Formula must have at least one term".to_string(),
            ));
        }

        Ok(Self { intercept, terms })
    }

    /// Additive formula with an intercept over the given covariates.
    pub fn additive<S: AsRef<str>>(covariates: &[S]) -> Result<Self> {
        let rhs: Vec<&str> = covariates.iter().map(|c| c.as_ref()).collect();
        if rhs.is_empty() {
            return Self::parse("~ 1");
        }
        Self::parse(&format!("~ {}", rhs.join(" + ")))
    }

    /// Covariate names as string slices.
    pub fn variables(&self) -> Vec<&str> {
        self.terms.iter().map(String::as_str).collect()
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if !self.intercept {
            parts.push("0");
        }
        parts.extend(self.terms.iter().map(String::as_str));
        if parts.is_empty() {
            parts.push("1");
        }
        write!(f, "~ {}", parts.join(" + "))
    }
}
