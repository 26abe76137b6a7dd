//! Zero handling.

pub mod pseudocount;

pub use pseudocount::{log_with_pseudocount, DEFAULT_PSEUDOCOUNT};
