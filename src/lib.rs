//! Statistical core for microbiome and imaging concordance reports.
//!
//! Takes sample metadata, taxon counts and optional imaging or
//! gene-function tables, and computes the data behind a fixed report:
//! group counts, diversity, ordinations, per-taxon regressions with FDR
//! control, distance-matrix pseudo-ANOVA and a Mantel test between the
//! microbiome and imaging domains. Rendering is left to the caller.
//!
//! # Overview
//!
//! - **data**: Core data structures (SampleTable, AbundanceMatrix, DistanceMatrix, results)
//! - **normalize**: Counts to within-sample proportions
//! - **filter**: Minimum-abundance taxon filter
//! - **zero**: Pseudocount before log transform
//! - **diversity**: Alpha diversity and beta-diversity distance matrices
//! - **ordination**: PCoA and reflection-aware ordination comparison
//! - **model**: Ordinary least squares
//! - **test**: t-tests, permutation pseudo-ANOVA, Mantel test
//! - **correct**: Benjamini-Hochberg correction
//! - **association**: Per-measure and per-taxon association tests
//! - **pipeline**: Report configuration and execution
//!
//! # Example
//!
//! ```no_run
//! use microbiome_report::prelude::*;
//!
//! let inputs = ReportInputs {
//!     samples: SampleTable::from_tsv("metadata.tsv").unwrap(),
//!     counts: AbundanceMatrix::from_tsv("counts.tsv").unwrap(),
//!     imaging: None,
//!     genes: None,
//! };
//! let report = run_report(&inputs, &ReportConfig::default()).unwrap();
//! println!("{}", report.to_json().unwrap());
//! ```

pub mod association;
pub mod correct;
pub mod data;
pub mod diversity;
pub mod error;
pub mod filter;
pub mod model;
pub mod normalize;
pub mod ordination;
pub mod pipeline;
pub mod test;
pub mod zero;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::association::{test_alpha_diversity, test_taxa, TaxonTestConfig};
    pub use crate::correct::{adjust_bh, correct_bh_by_term};
    pub use crate::data::{
        reconcile, reconcile_distances, verify_alignment, AbundanceMatrix, AnovaTable, AssociationResult,
        AssociationTable, DesignMatrix, DistanceMatrix, FeatureMatrix, Formula, Orientation,
        PermutationTestResult, SampleTable, Variable, VariableType,
    };
    pub use crate::diversity::{alpha_diversity, beta_diversity, DistanceMethod};
    pub use crate::error::{ReportError, Result};
    pub use crate::filter::filter_min_abundance;
    pub use crate::model::{fit_ols, model_lm, LmFit};
    pub use crate::normalize::{proportions, ProportionMatrix};
    pub use crate::ordination::{compare_ordinations, pcoa, OrdinationComparison, OrdinationResult};
    pub use crate::pipeline::{run_report, Report, ReportConfig, ReportInputs, SectionOutcome};
    pub use crate::test::{mantel, permanova, t_test, MantelMethod, PermutationConfig};
}
