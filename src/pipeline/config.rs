//! Report configuration.

use crate::association::TaxonTestConfig;
use crate::data::{Formula, Orientation};
use crate::diversity::{DistanceMethod, RICHNESS, SHANNON};
use crate::error::{ReportError, Result};
use crate::ordination::MAX_REFLECTION_AXES;
use crate::test::{MantelMethod, PermutationConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds and choices for one report run.
///
/// Every field has a default, so a YAML file only needs the values it
/// changes. The struct is read-only once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Minimum relative abundance for a taxon to enter diversity and
    /// association computations.
    pub min_abundance: f64,
    /// Colour-scale saturation for heatmaps. Presentation only.
    pub saturation_limit: f64,
    /// Nominal significance threshold.
    pub alpha: f64,
    /// Number of permutations for pseudo-ANOVA and Mantel tests.
    pub n_permutations: usize,
    /// Permutation seed.
    pub seed: u64,
    /// Run permutations and per-taxon fits on the rayon pool.
    pub parallel: bool,
    /// Pseudocount added to proportions before log transform.
    pub pseudocount: f64,
    /// Categorical covariate (e.g. sex).
    pub categorical_covariate: String,
    /// Optional continuous covariate.
    pub continuous_covariate: Option<String>,
    /// Alpha-diversity columns to model.
    pub alpha_measures: Vec<String>,
    /// Distance over taxon proportions.
    pub microbiome_distance: DistanceMethod,
    /// Distance over imaging features.
    pub imaging_distance: DistanceMethod,
    /// Layout of the imaging table.
    pub imaging_orientation: Orientation,
    /// Number of ordination axes reported and compared.
    pub ordination_axes: usize,
    /// Correlation used by the Mantel test.
    pub mantel_method: MantelMethod,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_abundance: 0.01,
            saturation_limit: 0.4,
            alpha: 0.05,
            n_permutations: 999,
            seed: 1,
            parallel: true,
            pseudocount: 1e-6,
            categorical_covariate: "sex".to_string(),
            continuous_covariate: Some("score".to_string()),
            alpha_measures: vec![SHANNON.to_string(), RICHNESS.to_string()],
            microbiome_distance: DistanceMethod::BrayCurtis,
            imaging_distance: DistanceMethod::Euclidean,
            imaging_orientation: Orientation::SamplesAsRows,
            ordination_axes: 2,
            mantel_method: MantelMethod::Pearson,
        }
    }
}

impl ReportConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ReportError::from)
    }

    /// Check every threshold is in range.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ReportError::InvalidParameter(msg.to_string()));
        if !(0.0..1.0).contains(&self.min_abundance) {
            return invalid("min_abundance must be in [0, 1)");
        }
        if !(self.saturation_limit > 0.0 && self.saturation_limit <= 1.0) {
            return invalid("saturation_limit must be in (0, 1]");
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return invalid("alpha must be in (0, 1)");
        }
        if self.n_permutations == 0 {
            return invalid("n_permutations must be at least 1");
        }
        if !(self.pseudocount > 0.0 && self.pseudocount.is_finite()) {
            return invalid("pseudocount must be positive");
        }
        if self.ordination_axes == 0 || self.ordination_axes > MAX_REFLECTION_AXES {
            return Err(ReportError::InvalidParameter(format!(
                "ordination_axes must be between 1 and {}",
                MAX_REFLECTION_AXES
            )));
        }
        if self.categorical_covariate.trim().is_empty() {
            return invalid("categorical_covariate must be set");
        }
        Ok(())
    }

    /// The model formula `~ categorical [+ continuous]`.
    pub fn formula(&self) -> Result<Formula> {
        let mut covariates = vec![self.categorical_covariate.as_str()];
        if let Some(c) = &self.continuous_covariate {
            covariates.push(c.as_str());
        }
        Formula::additive(&covariates)
    }

    /// Permutation settings for the multivariate tests.
    pub fn permutation_config(&self) -> PermutationConfig {
        PermutationConfig {
            n_permutations: self.n_permutations,
            seed: self.seed,
            parallel: self.parallel,
        }
    }

    /// Settings for per-taxon (and per-gene) models.
    pub fn taxon_config(&self) -> TaxonTestConfig {
        TaxonTestConfig {
            min_abundance: self.min_abundance,
            pseudocount: self.pseudocount,
        }
    }
}
