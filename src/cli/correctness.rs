
use anyhow::{bail, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct CorrectnessSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    springhare_version: String,

    /// Query variant call file (VCF), phased with PS tags
    #[clap(required = true)]
    #[clap(short = 'q')]
    #[clap(long = "query-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub query_vcf_filename: PathBuf,

    /// Truth variant call file (VCF), phased with PS tags
    #[clap(required = true)]
    #[clap(short = 't')]
    #[clap(long = "truth-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub truth_vcf_filename: PathBuf,

    /// Output summary table (.tsv or .csv)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-table")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Optional JSON dump of the parsed CLI settings
    #[clap(long = "output-settings")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub settings_filename: Option<PathBuf>,

    /// Comma-separated decay factors to evaluate, each in [0, 1]
    #[clap(short = 'd')]
    #[clap(long = "decay-list")]
    #[clap(value_name = "LIST")]
    #[clap(help_heading = Some("Metric parameters"))]
    #[clap(default_value = "0.0,0.5,1.0")]
    pub decay_list: String,

    /// Parsed decay values, filled in during settings checking
    #[clap(skip)]
    pub decay_values: Vec<f64>,

    /// Number of threads to use for per-contig evaluation
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_correctness_settings(mut settings: CorrectnessSettings) -> anyhow::Result<CorrectnessSettings> {
    // hard code the version in
    settings.springhare_version = FULL_VERSION.clone();
    info!("Springhare version: {:?}", &settings.springhare_version);
    info!("Sub-command: correctness");
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.query_vcf_filename, "Query VCF")?;
    check_required_filename(&settings.truth_vcf_filename, "Truth VCF")?;

    info!("\tQuery VCF: {:?}", &settings.query_vcf_filename);
    info!("\tTruth VCF: {:?}", &settings.truth_vcf_filename);

    // parse and range-check the decay list
    settings.decay_values = settings.decay_list.split(',')
        .map(|raw| {
            raw.trim().parse::<f64>()
                .with_context(|| format!("Error while parsing decay value {raw:?}:"))
        })
        .collect::<anyhow::Result<Vec<f64>>>()?;
    if settings.decay_values.is_empty() {
        bail!("At least one decay value is required");
    }
    for &decay in settings.decay_values.iter() {
        if !(0.0..=1.0).contains(&decay) {
            bail!("Decay factor is {decay}, must be between 0.0 and 1.0");
        }
    }

    info!("Metric parameters:");
    info!("\tDecay values: {:?}", settings.decay_values);

    info!("Outputs:");
    info!("\tSummary table: {:?}", &settings.output_filename);
    if let Some(settings_fn) = settings.settings_filename.as_ref() {
        info!("\tSettings JSON: {settings_fn:?}");
    }

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn touch_vcf() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".vcf").tempfile().unwrap();
        file.write_all(b"##fileformat=VCFv4.2\n").unwrap();
        file
    }

    #[test]
    fn test_decay_list_parsing() {
        let query = touch_vcf();
        let truth = touch_vcf();
        let settings = CorrectnessSettings {
            query_vcf_filename: query.path().to_path_buf(),
            truth_vcf_filename: truth.path().to_path_buf(),
            output_filename: "out.tsv".into(),
            decay_list: "0.0, 0.5,1.0".to_string(),
            threads: 1,
            ..Default::default()
        };

        let checked = check_correctness_settings(settings).unwrap();
        assert_eq!(checked.decay_values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_out_of_range_decay_rejected() {
        let query = touch_vcf();
        let truth = touch_vcf();
        let settings = CorrectnessSettings {
            query_vcf_filename: query.path().to_path_buf(),
            truth_vcf_filename: truth.path().to_path_buf(),
            output_filename: "out.tsv".into(),
            decay_list: "0.5,1.5".to_string(),
            threads: 1,
            ..Default::default()
        };
        assert!(check_correctness_settings(settings).is_err());

        let settings = CorrectnessSettings {
            query_vcf_filename: query.path().to_path_buf(),
            truth_vcf_filename: truth.path().to_path_buf(),
            output_filename: "out.tsv".into(),
            decay_list: "not_a_number".to_string(),
            threads: 1,
            ..Default::default()
        };
        assert!(check_correctness_settings(settings).is_err());
    }
}
