//! Hypothesis tests.
//!
//! - **ttest**: coefficient t-tests for per-entity linear models
//! - **permanova**: permutation pseudo-ANOVA on a distance matrix
//! - **mantel**: permutation test of distance-matrix concordance
//! - **permutation**: seeding, replicate scheduling and empirical p-values

pub mod mantel;
pub mod permanova;
pub mod permutation;

pub use mantel::{average_ranks, mantel, pearson, MantelMethod};
pub use permanova::permanova;
pub use permutation::{
    count_extreme, empirical_p_value, permutation_indices, power_notes, run_replicates, PermutationConfig,
    LOW_POWER_SAMPLES, TIE_TOLERANCE,
};
pub use ttest::{t_test, t_test_all, two_sided_t_pvalue};
