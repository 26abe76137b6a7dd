//! Per-taxon association tests with BH correction.

use crate::correct::correct_bh_by_term;
use crate::data::{reconcile_ids, verify_alignment, AssociationTable, DesignMatrix, Formula, SampleTable};
use crate::error::{ReportError, Result};
use crate::filter::filter_min_abundance;
use crate::model::model_lm;
use crate::normalize::ProportionMatrix;
use crate::test::t_test_all;
use crate::zero::pseudocount::{describe, log_with_pseudocount, DEFAULT_PSEUDOCOUNT};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Settings for per-taxon testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonTestConfig {
    /// A taxon is tested only if its proportion exceeds this in some sample.
    pub min_abundance: f64,
    /// Added to proportions before the log transform.
    pub pseudocount: f64,
}

impl Default for TaxonTestConfig {
    fn default() -> Self {
        Self {
            min_abundance: 0.01,
            pseudocount: DEFAULT_PSEUDOCOUNT,
        }
    }
}

/// Fit `ln(p + pseudocount) ~ formula` for every eligible taxon.
///
/// # Steps
/// 1. Drop zero-total samples and samples missing a covariate
/// 2. Reconcile proportions and sample table by ID (proportion order)
/// 3. Keep taxa above `min_abundance` in at least one remaining sample
/// 4. One OLS model per taxon, t-test on every non-intercept coefficient
/// 5. BH across all tested taxa, separately per term
///
/// Taxa with a constant response are excluded before correction and do not
/// count towards the family size. A degenerate design (e.g. a covariate
/// left with a single level) excludes every eligible taxon.
pub fn test_taxa(
    props: &ProportionMatrix,
    samples: &SampleTable,
    formula: &Formula,
    config: &TaxonTestConfig,
) -> Result<AssociationTable> {
    let props = props.drop_empty_samples()?;
    let complete = samples.complete_cases(&formula.variables())?;

    let common = reconcile_ids(&props.sample_ids, &complete)?;
    let props = props.select_samples(&common)?;
    let samples = samples.subset_samples(&common)?;
    verify_alignment(&props.sample_ids, samples.sample_ids())?;

    let eligible = filter_min_abundance(&props, config.min_abundance)?;
    let responses = log_with_pseudocount(&eligible, config.pseudocount)?;
    let fitted = DesignMatrix::from_formula(&samples, formula)
        .and_then(|design| model_lm(&responses, &eligible.taxon_ids, &design));
    let fit = match fitted {
        Ok(fit) => fit,
        Err(ReportError::DegenerateInput(reason)) => {
            // The design is shared, so no taxon can be modelled
            warn!("No taxon model fitted: {}", reason);
            return Ok(AssociationTable {
                formula: formula.to_string(),
                response: describe(config.pseudocount),
                results: Vec::new(),
                excluded: eligible
                    .taxon_ids
                    .iter()
                    .map(|id| (id.clone(), reason.clone()))
                    .collect(),
            });
        }
        Err(e) => return Err(e),
    };
    let uncorrected = AssociationTable {
        formula: formula.to_string(),
        response: describe(config.pseudocount),
        results: t_test_all(&fit)?,
        excluded: fit.skipped.clone(),
    };

    info!(
        "Taxon models: {} of {} taxa eligible, {} fitted on {} samples",
        eligible.n_taxa(),
        props.n_taxa(),
        fit.n_fits(),
        common.len()
    );

    Ok(correct_bh_by_term(&uncorrected))
}
