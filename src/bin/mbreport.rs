//! mbreport - microbiome and imaging report CLI
//!
//! Computes every report section from TSV inputs and writes the results as
//! JSON plus TSV tables.

use clap::{Parser, Subcommand};
use log::info;
use microbiome_report::data::{AbundanceMatrix, FeatureMatrix, SampleTable};
use microbiome_report::error::Result;
use microbiome_report::pipeline::{run_report, Report, ReportConfig, ReportInputs, SectionOutcome};
use std::path::{Path, PathBuf};

/// Statistical core for microbiome and imaging concordance reports
#[derive(Parser)]
#[command(name = "mbreport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute all report sections
    Run {
        /// Sample metadata TSV (first column = sample ID)
        #[arg(short, long)]
        metadata: PathBuf,

        /// Taxon count TSV (taxa × samples)
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Imaging feature TSV
        #[arg(short, long)]
        imaging: Option<PathBuf>,

        /// Gene-function count TSV (features × samples)
        #[arg(short, long)]
        genes: Option<PathBuf>,

        /// Report configuration YAML (defaults used when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the default configuration as YAML
    Config,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            metadata,
            counts,
            imaging,
            genes,
            config,
            output,
        } => cmd_run(&metadata, &counts, imaging.as_deref(), genes.as_deref(), config.as_deref(), &output),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    metadata_path: &Path,
    counts_path: &Path,
    imaging_path: Option<&Path>,
    genes_path: Option<&Path>,
    config_path: Option<&Path>,
    output_dir: &Path,
) -> Result<()> {
    let config = match config_path {
        Some(path) => ReportConfig::from_file(path)?,
        None => ReportConfig::default(),
    };

    eprintln!("Loading data...");
    let samples = SampleTable::from_tsv(metadata_path)?;
    let counts = AbundanceMatrix::from_tsv(counts_path)?;
    let imaging = imaging_path
        .map(|p| FeatureMatrix::from_tsv(p, config.imaging_orientation))
        .transpose()?;
    let genes = genes_path.map(AbundanceMatrix::from_tsv).transpose()?;
    eprintln!(
        "Loaded {} samples, {} taxa x {} samples",
        samples.n_samples(),
        counts.n_taxa(),
        counts.n_samples()
    );

    let inputs = ReportInputs {
        samples,
        counts,
        imaging,
        genes,
    };
    let report = run_report(&inputs, &config)?;

    std::fs::create_dir_all(output_dir)?;
    let json_path = output_dir.join("report.json");
    std::fs::write(&json_path, report.to_json()?)?;
    let tables = report.write_tables(output_dir)?;
    info!("Wrote {:?} and {} table(s)", json_path, tables.len());

    print_summary(&report);
    Ok(())
}

fn status<T>(outcome: &SectionOutcome<T>) -> String {
    match outcome {
        SectionOutcome::Completed { .. } => "ok".to_string(),
        SectionOutcome::Failed { error } => format!("FAILED ({})", error),
        SectionOutcome::Skipped { reason } => format!("skipped ({})", reason),
    }
}

fn print_summary(report: &Report) {
    eprintln!("Sections:");
    eprintln!("  group counts:           {}", status(&report.group_counts));
    eprintln!("  alpha distributions:    {}", status(&report.alpha_distributions));
    eprintln!("  alpha associations:     {}", status(&report.alpha_associations));
    eprintln!("  taxon associations:     {}", status(&report.taxon_associations));
    eprintln!("  gene associations:      {}", status(&report.gene_associations));
    eprintln!("  microbiome pseudo-ANOVA: {}", status(&report.microbiome_anova));
    eprintln!("  microbiome ordination:  {}", status(&report.microbiome_ordination));
    eprintln!("  imaging pseudo-ANOVA:   {}", status(&report.imaging_anova));
    eprintln!("  imaging ordination:     {}", status(&report.imaging_ordination));
    eprintln!("  Mantel test:            {}", status(&report.mantel));
    eprintln!("  ordination concordance: {}", status(&report.ordination_concordance));

    if let Some(taxa) = report.taxon_associations.result() {
        let alpha = report.config.alpha;
        let n_sig = taxa
            .results
            .iter()
            .filter(|r| r.q_value.map_or(false, |q| q < alpha))
            .count();
        eprintln!("  {} taxon coefficient(s) with q < {}", n_sig, alpha);
    }
    if let Some(m) = report.mantel.result() {
        eprintln!("  Mantel r = {:.3}, p = {:.3}", m.statistic, m.p_value);
    }
}

fn cmd_config() -> Result<()> {
    print!("{}", ReportConfig::default().to_yaml()?);
    Ok(())
}
