//! Alpha-diversity association tests and per-group distributions.

use crate::data::{AssociationTable, DesignMatrix, Formula, SampleTable, VariableType};
use crate::error::{ReportError, Result};
use crate::model::model_lm;
use crate::test::t_test_all;
use log::{info, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Values of one alpha measure within one group, for distribution plots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDistribution {
    /// Alpha-diversity measure.
    pub measure: String,
    /// Group level.
    pub group: String,
    /// (sample ID, value) pairs in table order.
    pub values: Vec<(String, f64)>,
    /// Mean of the values.
    pub mean: f64,
    /// Median of the values.
    pub median: f64,
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Per-group distributions of each measure, split by a categorical column.
///
/// Samples missing either the group or the measure are left out.
pub fn alpha_distributions(
    samples: &SampleTable,
    measures: &[String],
    group_column: &str,
) -> Result<Vec<GroupDistribution>> {
    let groups = samples.column(group_column)?;
    let mut out = Vec::new();
    for measure in measures {
        let values = samples.continuous(measure)?;
        for level in samples.levels(group_column)? {
            let pairs: Vec<(String, f64)> = samples
                .sample_ids()
                .iter()
                .zip(groups)
                .zip(&values)
                .filter(|((_, g), v)| g.as_categorical() == Some(level.as_str()) && !v.is_nan())
                .map(|((id, _), &v)| (id.clone(), v))
                .collect();
            let mut sorted: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
            let mean = if sorted.is_empty() {
                f64::NAN
            } else {
                sorted.iter().sum::<f64>() / sorted.len() as f64
            };
            out.push(GroupDistribution {
                measure: measure.clone(),
                group: level,
                mean,
                median: median(&mut sorted),
                values: pairs,
            });
        }
    }
    Ok(out)
}

/// Fit `measure ~ formula` for each alpha measure, on complete cases only.
///
/// Missing measure or covariate columns fail the whole call. A measure whose
/// model is degenerate (too few samples, constant response, single-level
/// covariate) is listed in `excluded`. No FDR correction is applied: the
/// handful of measures is not a discovery family.
pub fn test_alpha_diversity(
    samples: &SampleTable,
    measures: &[String],
    formula: &Formula,
) -> Result<AssociationTable> {
    let mut required: Vec<&str> = measures.iter().map(String::as_str).collect();
    required.extend(formula.variables());
    samples.require_columns(&required)?;

    let mut results = Vec::new();
    let mut excluded = Vec::new();

    for measure in measures {
        if samples.column_type(measure) != Some(VariableType::Continuous) {
            return Err(ReportError::InvalidVariableType {
                column: measure.clone(),
                reason: "alpha-diversity measure must be numeric".to_string(),
            });
        }

        let mut columns = vec![measure.as_str()];
        columns.extend(formula.variables());
        let complete = samples.complete_cases(&columns)?;
        if complete.is_empty() {
            warn!("Alpha measure '{}' not tested: no complete samples", measure);
            excluded.push((measure.clone(), "no samples with a value and complete covariates".to_string()));
            continue;
        }
        let subset = samples.subset_samples(&complete)?;

        let outcome = DesignMatrix::from_formula(&subset, formula).and_then(|design| {
            let y = subset.continuous(measure)?;
            let responses = DMatrix::from_row_slice(1, y.len(), &y);
            model_lm(&responses, std::slice::from_ref(measure), &design)
        });

        match outcome {
            Ok(fit) => {
                excluded.extend(fit.skipped.iter().cloned());
                results.extend(t_test_all(&fit)?);
            }
            Err(ReportError::DegenerateInput(reason)) => {
                warn!("Alpha measure '{}' not tested: {}", measure, reason);
                excluded.push((measure.clone(), reason));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Alpha-diversity models: {} measure(s) tested, {} excluded",
        measures.len() - excluded.len(),
        excluded.len()
    );

    Ok(AssociationTable {
        formula: formula.to_string(),
        response: "identity".to_string(),
        results,
        excluded,
    })
}
