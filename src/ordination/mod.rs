//! Ordination: principal coordinates and concordance between ordinations.

pub mod compare;
pub mod pcoa;

pub use compare::{compare_ordinations, OrdinationComparison, MAX_REFLECTION_AXES};
pub use pcoa::{gower_centered, pcoa, AxisSummary, OrdinationPoint, OrdinationResult, OrdinationSeries};
