//! Composition: counts to relative proportions.

pub mod proportions;

pub use proportions::{proportions, ProportionMatrix};
