//! Linear model fitting via OLS.

use crate::data::DesignMatrix;
use crate::error::{ReportError, Result};
use log::warn;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Singular values below this fraction of the largest count as zero.
const RANK_TOL: f64 = 1e-10;

/// Results from fitting a linear model to a single response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmFitSingle {
    /// Tested entity (taxon or alpha-diversity measure).
    pub entity: String,
    /// Estimated coefficients.
    pub coefficients: Vec<f64>,
    /// Standard errors of coefficients.
    pub std_errors: Vec<f64>,
    /// Residuals.
    #[serde(skip)]
    pub residuals: Vec<f64>,
    /// Residual standard error (sigma).
    pub sigma: f64,
    /// R-squared.
    pub r_squared: f64,
    /// Degrees of freedom (residual).
    pub df_residual: usize,
}

impl LmFitSingle {
    /// Coefficient by index.
    pub fn get_coefficient(&self, index: usize) -> Option<f64> {
        self.coefficients.get(index).copied()
    }

    /// Standard error by index.
    pub fn get_std_error(&self, index: usize) -> Option<f64> {
        self.std_errors.get(index).copied()
    }

    /// t-statistic for a coefficient.
    ///
    /// A perfect fit (zero standard error) with a non-zero estimate gives an
    /// infinite statistic; a zero estimate gives `None`.
    pub fn t_statistic(&self, index: usize) -> Option<f64> {
        let coef = *self.coefficients.get(index)?;
        let se = *self.std_errors.get(index)?;
        if se > 0.0 {
            Some(coef / se)
        } else if se == 0.0 && coef != 0.0 {
            Some(coef.signum() * f64::INFINITY)
        } else {
            None
        }
    }
}

/// Results from fitting one linear model per entity against a shared design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmFit {
    /// Individual fits, in input order, degenerate entities omitted.
    pub fits: Vec<LmFitSingle>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
    /// Number of samples.
    pub n_samples: usize,
    /// Entities excluded as degenerate, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl LmFit {
    /// Fit for a specific entity.
    pub fn get(&self, entity: &str) -> Option<&LmFitSingle> {
        self.fits.iter().find(|f| f.entity == entity)
    }

    /// Coefficient index by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Number of fitted entities.
    pub fn n_fits(&self) -> usize {
        self.fits.len()
    }

    /// Number of coefficients (including intercept if present).
    pub fn n_coefficients(&self) -> usize {
        self.coefficient_names.len()
    }
}

/// Precomputed pieces of an OLS design.
struct OlsDesign<'a> {
    x: &'a DMatrix<f64>,
    xtx_inv: DMatrix<f64>,
    df_residual: usize,
}

impl<'a> OlsDesign<'a> {
    fn new(design: &'a DesignMatrix) -> Result<Self> {
        let n_samples = design.n_samples();
        let n_coef = design.n_coefficients();
        let df_residual = n_samples.saturating_sub(n_coef);
        if df_residual == 0 {
            return Err(ReportError::DegenerateInput(format!(
                "Model is saturated ({} samples, {} coefficients)",
                n_samples, n_coef
            )));
        }

        let x = design.matrix();
        let svd = x.clone().svd(false, false);
        let rank = svd.rank(RANK_TOL * svd.singular_values.max());
        if rank < n_coef {
            return Err(ReportError::DegenerateInput(format!(
                "Design matrix is rank deficient (rank {} < {} coefficients)",
                rank, n_coef
            )));
        }

        let xtx = x.transpose() * x;
        let xtx_inv = xtx.try_inverse().ok_or_else(|| {
            ReportError::DegenerateInput("Design matrix is singular (X'X not invertible)".to_string())
        })?;
        if (0..n_coef).any(|j| !(xtx_inv[(j, j)].is_finite() && xtx_inv[(j, j)] > 0.0)) {
            return Err(ReportError::DegenerateInput(
                "Design matrix is numerically singular".to_string(),
            ));
        }

        Ok(Self { x, xtx_inv, df_residual })
    }

    fn fit(&self, entity: &str, y: &[f64]) -> Result<LmFitSingle> {
        let n = y.len();
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ReportError::DegenerateInput(format!(
                "Response '{}' has non-finite values",
                entity
            )));
        }
        let y_mean = y.iter().sum::<f64>() / n as f64;
        let tss: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
        if tss <= f64::EPSILON * y_mean.abs().max(1.0) * n as f64 {
            return Err(ReportError::DegenerateInput(format!(
                "Response '{}' has zero variance",
                entity
            )));
        }

        let y_vec = DVector::from_column_slice(y);

        // beta = (X'X)^-1 X'y
        let beta = &self.xtx_inv * (self.x.transpose() * &y_vec);
        let residuals_vec = &y_vec - self.x * &beta;
        let residuals: Vec<f64> = residuals_vec.iter().cloned().collect();
        let rss: f64 = residuals.iter().map(|e| e * e).sum();

        let sigma = (rss / self.df_residual as f64).sqrt();
        let std_errors: Vec<f64> = (0..beta.len())
            .map(|j| sigma * self.xtx_inv[(j, j)].sqrt())
            .collect();

        Ok(LmFitSingle {
            entity: entity.to_string(),
            coefficients: beta.iter().cloned().collect(),
            std_errors,
            residuals,
            sigma,
            r_squared: 1.0 - rss / tss,
            df_residual: self.df_residual,
        })
    }
}

/// Fit one response by OLS.
pub fn fit_ols(entity: &str, y: &[f64], design: &DesignMatrix) -> Result<LmFitSingle> {
    if y.len() != design.n_samples() {
        return Err(ReportError::DimensionMismatch {
            expected: design.n_samples(),
            actual: y.len(),
        });
    }
    OlsDesign::new(design)?.fit(entity, y)
}

/// Fit one linear model per row of `responses` (entities × samples).
///
/// Columns of `responses` must follow the design's sample order. (X'X)⁻¹ is
/// computed once and shared. Entities with a degenerate response (constant
/// or non-finite) are skipped with a warning; a singular design fails the
/// whole call.
pub fn model_lm(responses: &DMatrix<f64>, entity_ids: &[String], design: &DesignMatrix) -> Result<LmFit> {
    let n_samples = responses.ncols();
    if design.n_samples() != n_samples {
        return Err(ReportError::DimensionMismatch {
            expected: n_samples,
            actual: design.n_samples(),
        });
    }
    if entity_ids.len() != responses.nrows() {
        return Err(ReportError::DimensionMismatch {
            expected: responses.nrows(),
            actual: entity_ids.len(),
        });
    }

    let ols = OlsDesign::new(design)?;

    let outcomes: Vec<Result<LmFitSingle>> = (0..responses.nrows())
        .into_par_iter()
        .map(|i| {
            let y: Vec<f64> = responses.row(i).iter().copied().collect();
            ols.fit(&entity_ids[i], &y)
        })
        .collect();

    let mut fits = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for (id, outcome) in entity_ids.iter().zip(outcomes) {
        match outcome {
            Ok(fit) => fits.push(fit),
            Err(e) => {
                warn!("Skipping '{}': {}", id, e);
                skipped.push((id.clone(), e.to_string()));
            }
        }
    }

    Ok(LmFit {
        fits,
        coefficient_names: design.coefficient_names().to_vec(),
        n_samples,
        skipped,
    })
}
