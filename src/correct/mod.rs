//! Multiple testing correction.

pub mod bh;

pub use bh::{adjust_bh, correct_bh_by_term};
