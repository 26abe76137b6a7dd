//! Per-entity association testing.
//!
//! One OLS model `response ~ covariates` per alpha-diversity measure or per
//! taxon, with coefficient t-tests. Taxon families are BH-corrected per term
//! over every tested taxon before any significance filter.

pub mod alpha;
pub mod taxa;

pub use alpha::{alpha_distributions, test_alpha_diversity, GroupDistribution};
pub use taxa::{test_taxa, TaxonTestConfig};
