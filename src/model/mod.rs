//! Statistical models.

pub mod lm;

pub use lm::{fit_ols, model_lm, LmFit, LmFitSingle};
