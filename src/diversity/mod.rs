//! Diversity metrics.
//!
//! - **alpha**: within-sample richness and Shannon index
//! - **beta**: between-sample distance matrices

pub mod alpha;
pub mod beta;

pub use alpha::{alpha_diversity, AlphaDiversity, RICHNESS, SHANNON};
pub use beta::{beta_diversity, bray_curtis, euclidean, jaccard, manhattan, DistanceMethod};
