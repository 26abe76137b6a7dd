//! Taxon eligibility filtering.

pub mod abundance;

pub use abundance::filter_min_abundance;
