//! Report runner: composes the engines into independent report sections.

use super::config::ReportConfig;
use crate::association::{alpha_distributions, test_alpha_diversity, test_taxa, GroupDistribution};
use crate::data::{
    reconcile, reconcile_distances, AbundanceMatrix, AnovaTable, AssociationTable, DistanceMatrix,
    FeatureMatrix, Formula, PermutationTestResult, SampleTable, VariableType,
};
use crate::diversity::{alpha_diversity, beta_diversity};
use crate::error::{ReportError, Result};
use crate::filter::filter_min_abundance;
use crate::normalize::proportions;
use crate::ordination::{compare_ordinations, pcoa, OrdinationComparison, OrdinationResult, OrdinationSeries};
use crate::test::{mantel, permanova, LOW_POWER_SAMPLES};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Tables handed over by the loader.
#[derive(Debug, Clone)]
pub struct ReportInputs {
    /// Sample metadata, optionally with precomputed alpha diversity.
    pub samples: SampleTable,
    /// Taxon counts (taxa × samples).
    pub counts: AbundanceMatrix,
    /// Imaging-derived features, if available.
    pub imaging: Option<FeatureMatrix>,
    /// Gene-function counts (features × samples), if available.
    pub genes: Option<AbundanceMatrix>,
}

/// Outcome of one report section.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionOutcome<T> {
    /// The section produced its result.
    Completed { result: T },
    /// The section failed; other sections are unaffected.
    Failed { error: String },
    /// The section's optional input was not supplied.
    Skipped { reason: String },
}

impl<T> SectionOutcome<T> {
    /// Wrap a section result, logging failures.
    pub fn from_result(section: &str, result: Result<T>) -> Self {
        match result {
            Ok(result) => Self::Completed { result },
            Err(e) => {
                warn!("Section '{}' failed: {}", section, e);
                Self::Failed { error: e.to_string() }
            }
        }
    }

    /// The result, if the section completed.
    pub fn result(&self) -> Option<&T> {
        match self {
            Self::Completed { result } => Some(result),
            _ => None,
        }
    }

    /// Whether the section completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Whether the section failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// All computed report content.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Configuration the report was computed with.
    pub config: ReportConfig,
    /// Model formula used by every regression and pseudo-ANOVA.
    pub formula: String,
    /// Samples in the sample table.
    pub n_samples: usize,
    /// Run-level notes.
    pub notes: Vec<String>,
    /// Samples per level of the categorical covariate.
    pub group_counts: SectionOutcome<BTreeMap<String, usize>>,
    /// Alpha-diversity values per group, for distribution plots.
    pub alpha_distributions: SectionOutcome<Vec<GroupDistribution>>,
    /// Alpha-diversity regressions.
    pub alpha_associations: SectionOutcome<AssociationTable>,
    /// Per-taxon regressions with q-values.
    pub taxon_associations: SectionOutcome<AssociationTable>,
    /// Per-gene-function regressions with q-values.
    pub gene_associations: SectionOutcome<AssociationTable>,
    /// Pseudo-ANOVA on the microbiome distance matrix.
    pub microbiome_anova: SectionOutcome<AnovaTable>,
    /// PCoA coordinates of the microbiome distance matrix.
    pub microbiome_ordination: SectionOutcome<OrdinationSeries>,
    /// Pseudo-ANOVA on the imaging distance matrix.
    pub imaging_anova: SectionOutcome<AnovaTable>,
    /// PCoA coordinates of the imaging distance matrix.
    pub imaging_ordination: SectionOutcome<OrdinationSeries>,
    /// Mantel test between microbiome and imaging distances.
    pub mantel: SectionOutcome<PermutationTestResult>,
    /// Reflection-aware agreement of the two ordinations.
    pub ordination_concordance: SectionOutcome<OrdinationComparison>,
}

impl Report {
    /// Serialize the report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Write every completed table section as TSV into `dir`.
    pub fn write_tables<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let mut written = Vec::new();

        let associations = [
            ("alpha_associations.tsv", &self.alpha_associations),
            ("taxon_associations.tsv", &self.taxon_associations),
            ("gene_associations.tsv", &self.gene_associations),
        ];
        for (name, section) in associations {
            if let Some(table) = section.result() {
                let path = dir.join(name);
                table.to_tsv(&path)?;
                written.push(path);
            }
        }

        let anovas = [
            ("microbiome_anova.tsv", &self.microbiome_anova),
            ("imaging_anova.tsv", &self.imaging_anova),
        ];
        for (name, section) in anovas {
            if let Some(table) = section.result() {
                let path = dir.join(name);
                table.to_tsv(&path)?;
                written.push(path);
            }
        }

        if let Some(counts) = self.group_counts.result() {
            let path = dir.join("group_counts.tsv");
            let mut writer = BufWriter::new(File::create(&path)?);
            writeln!(writer, "{}\tn", self.config.categorical_covariate)?;
            for (level, n) in counts {
                writeln!(writer, "{}\t{}", level, n)?;
            }
            written.push(path);
        }

        Ok(written)
    }
}

fn upstream<T: Clone>(input: &std::result::Result<T, String>) -> Result<T> {
    input.clone().map_err(ReportError::Section)
}

/// Restrict a distance matrix and sample table to samples that are in
/// both and complete for every formula variable, in matching order.
fn joint_inputs(
    distances: &DistanceMatrix,
    samples: &SampleTable,
    formula: &Formula,
) -> Result<(DistanceMatrix, SampleTable)> {
    let complete = samples.complete_cases(&formula.variables())?;
    let reconciled = reconcile(distances, &samples.subset_samples(&complete)?)?;
    if !reconciled.dropped_from_distances.is_empty() {
        info!(
            "{} sample(s) without metadata left out of the pseudo-ANOVA",
            reconciled.dropped_from_distances.len()
        );
    }
    Ok((reconciled.distances, reconciled.samples))
}

fn microbiome_distances(counts: &AbundanceMatrix, config: &ReportConfig) -> Result<DistanceMatrix> {
    let props = proportions(counts)?.drop_empty_samples()?;
    let kept = filter_min_abundance(&props, config.min_abundance)?;
    beta_diversity(&kept.to_features()?, config.microbiome_distance)
}

/// Run every report section.
///
/// Only an invalid configuration fails the call. Each section's failure is
/// recorded in its [`SectionOutcome`] and later sections still run.
pub fn run_report(inputs: &ReportInputs, config: &ReportConfig) -> Result<Report> {
    config.validate()?;
    let formula = config.formula()?;
    let perm = config.permutation_config();
    let axes = config.ordination_axes;

    info!(
        "Running report: {} samples, {} taxa, formula {}",
        inputs.samples.n_samples(),
        inputs.counts.n_taxa(),
        formula
    );

    let mut notes = Vec::new();
    if inputs.samples.n_samples() < LOW_POWER_SAMPLES {
        let msg = format!(
            "Only {} samples in the sample table; inferential results have limited power",
            inputs.samples.n_samples()
        );
        warn!("{}", msg);
        notes.push(msg);
    }

    // Computed alpha diversity fills in measures the table does not carry
    let mut samples = alpha_diversity(&inputs.counts).attach_to(inputs.samples.clone())?;
    // Numeric group codes (e.g. sex as 0/1) are levels, not a slope
    if samples.column_type(&config.categorical_covariate) == Some(VariableType::Continuous) {
        info!(
            "Treating numeric column '{}' as categorical",
            config.categorical_covariate
        );
        samples = samples.with_column_type(&config.categorical_covariate, VariableType::Categorical)?;
    }

    let group_counts = SectionOutcome::from_result(
        "group_counts",
        samples.group_counts(&config.categorical_covariate).and_then(|counts| {
            if counts.is_empty() {
                Err(ReportError::MissingColumn(config.categorical_covariate.clone()))
            } else {
                Ok(counts)
            }
        }),
    );
    let alpha_dists = SectionOutcome::from_result(
        "alpha_distributions",
        alpha_distributions(&samples, &config.alpha_measures, &config.categorical_covariate),
    );
    let alpha_assoc = SectionOutcome::from_result(
        "alpha_associations",
        test_alpha_diversity(&samples, &config.alpha_measures, &formula),
    );

    let taxon_assoc = SectionOutcome::from_result(
        "taxon_associations",
        proportions(&inputs.counts)
            .and_then(|props| test_taxa(&props, &samples, &formula, &config.taxon_config())),
    );
    let gene_assoc = match &inputs.genes {
        Some(genes) => SectionOutcome::from_result(
            "gene_associations",
            proportions(genes).and_then(|props| test_taxa(&props, &samples, &formula, &config.taxon_config())),
        ),
        None => SectionOutcome::Skipped {
            reason: "no gene-function table supplied".to_string(),
        },
    };

    // Distance matrices feed several sections; keep their errors as text
    let micro_dm = microbiome_distances(&inputs.counts, config).map_err(|e| {
        warn!("Microbiome distances unavailable: {}", e);
        format!("microbiome distances: {}", e)
    });
    let imaging_dm = inputs.imaging.as_ref().map(|features| {
        beta_diversity(features, config.imaging_distance).map_err(|e| {
            warn!("Imaging distances unavailable: {}", e);
            format!("imaging distances: {}", e)
        })
    });

    let microbiome_anova = SectionOutcome::from_result(
        "microbiome_anova",
        upstream(&micro_dm)
            .and_then(|dm| joint_inputs(&dm, &samples, &formula))
            .and_then(|(dm, table)| permanova(&dm, &table, &formula, &perm)),
    );
    let micro_ord: std::result::Result<OrdinationResult, String> = upstream(&micro_dm)
        .and_then(|dm| pcoa(&dm))
        .map_err(|e| e.to_string());
    let microbiome_ordination = SectionOutcome::from_result(
        "microbiome_ordination",
        upstream(&micro_ord).map(|ord| ord.series(axes)),
    );

    let skipped = || "no imaging table supplied".to_string();
    let (imaging_anova, imaging_ordination, mantel_outcome, concordance) = match &imaging_dm {
        None => (
            SectionOutcome::Skipped { reason: skipped() },
            SectionOutcome::Skipped { reason: skipped() },
            SectionOutcome::Skipped { reason: skipped() },
            SectionOutcome::Skipped { reason: skipped() },
        ),
        Some(imaging_dm) => {
            let anova = SectionOutcome::from_result(
                "imaging_anova",
                upstream(imaging_dm)
                    .and_then(|dm| joint_inputs(&dm, &samples, &formula))
                    .and_then(|(dm, table)| permanova(&dm, &table, &formula, &perm)),
            );
            let ordination = SectionOutcome::from_result(
                "imaging_ordination",
                upstream(imaging_dm).and_then(|dm| pcoa(&dm)).map(|ord| ord.series(axes)),
            );

            // Both cross-domain sections work on the shared samples only
            let paired = upstream(&micro_dm).and_then(|micro| {
                let imaging = upstream(imaging_dm)?;
                reconcile_distances(&micro, &imaging)
            });
            let mantel_outcome = SectionOutcome::from_result(
                "mantel",
                paired
                    .as_ref()
                    .map_err(|e| ReportError::Section(e.to_string()))
                    .and_then(|(micro, imaging)| mantel(micro, imaging, config.mantel_method, &perm)),
            );
            let concordance = SectionOutcome::from_result(
                "ordination_concordance",
                paired
                    .map_err(|e| ReportError::Section(e.to_string()))
                    .and_then(|(micro, imaging)| {
                        compare_ordinations(&pcoa(&micro)?, &pcoa(&imaging)?, axes)
                    }),
            );
            (anova, ordination, mantel_outcome, concordance)
        }
    };

    let report = Report {
        config: config.clone(),
        formula: formula.to_string(),
        n_samples: inputs.samples.n_samples(),
        notes,
        group_counts,
        alpha_distributions: alpha_dists,
        alpha_associations: alpha_assoc,
        taxon_associations: taxon_assoc,
        gene_associations: gene_assoc,
        microbiome_anova,
        microbiome_ordination,
        imaging_anova,
        imaging_ordination,
        mantel: mantel_outcome,
        ordination_concordance: concordance,
    };

    let failed = [
        report.group_counts.is_failed(),
        report.alpha_distributions.is_failed(),
        report.alpha_associations.is_failed(),
        report.taxon_associations.is_failed(),
        report.gene_associations.is_failed(),
        report.microbiome_anova.is_failed(),
        report.microbiome_ordination.is_failed(),
        report.imaging_anova.is_failed(),
        report.imaging_ordination.is_failed(),
        report.mantel.is_failed(),
        report.ordination_concordance.is_failed(),
    ]
    .iter()
    .filter(|&&f| f)
    .count();
    info!("Report complete: {} section(s) failed", failed);

    Ok(report)
}
