
use indicatif::{ParallelProgressIterator, ProgressState, ProgressStyle};
use log::{LevelFilter, error, info, warn};
use rayon::prelude::*;
use std::time::Instant;

use springhare::cli::core::{Commands, get_cli};
use springhare::cli::correctness::{CorrectnessSettings, check_correctness_settings};
use springhare::correctness::metric::phasing_correctness;
use springhare::parsing::phased_vcf::{get_shared_contigs, load_phased_variants};
use springhare::util::json_io::save_json;
use springhare::writers::correctness_summary::{CorrectnessRow, CorrectnessSummaryWriter};

/// Progress styling for the per-(contig, decay) evaluation sweep
fn correctness_progress_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.green/white} {pos}/{len} contig-decay pairs ({sweep_percent}); ETA: {eta_precise}")
        .unwrap()
        .with_key("sweep_percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            write!(w, "{:.1}%", state.fraction() * 100.0).unwrap()
        })
        .progress_chars("=> ")
}

fn run_correctness(settings: CorrectnessSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let settings = match check_correctness_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    // save the CLI options if requested
    if let Some(settings_fn) = settings.settings_filename.as_ref() {
        info!("Saving CLI options to {settings_fn:?}...");
        if let Err(e) = save_json(&settings, settings_fn) {
            error!("Error while saving CLI options: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // pre-load both phased variant sets
    info!("Loading query variants...");
    let query_variants = match load_phased_variants(&settings.query_vcf_filename) {
        Ok(qv) => qv,
        Err(e) => {
            error!("Error while loading query VCF: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };

    info!("Loading truth variants...");
    let truth_variants = match load_phased_variants(&settings.truth_vcf_filename) {
        Ok(tv) => tv,
        Err(e) => {
            error!("Error while loading truth VCF: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };

    // metric evaluations are independent per (contig, decay)
    let shared_contigs = get_shared_contigs(&query_variants, &truth_variants);
    if shared_contigs.is_empty() {
        warn!("Query and truth VCFs share no contigs.");
    }
    info!("Evaluating {} decay values over {} shared contigs...", settings.decay_values.len(), shared_contigs.len());

    let work_items: Vec<(&String, f64)> = shared_contigs.iter()
        .flat_map(|contig| settings.decay_values.iter().map(move |&decay| (contig, decay)))
        .collect();

    let style = correctness_progress_style();
    let all_results: Vec<anyhow::Result<CorrectnessRow>> = work_items.into_par_iter()
        .progress_with_style(style)
        .map(|(contig, decay)| {
            let result = phasing_correctness(&query_variants[contig], &truth_variants[contig], decay)?;
            Ok(CorrectnessRow {
                contig: contig.clone(),
                num_pairs: result.num_phased,
                decay,
                correctness: result.correctness
            })
        })
        .collect();

    let mut summary_writer = CorrectnessSummaryWriter::default();
    let mut error_contigs = 0;
    for result in all_results.into_iter() {
        match result {
            Ok(row) => {
                info!("{}\tpairs={}\tdecay={:.3}\tcorrectness={:.6}", row.contig, row.num_pairs, row.decay, row.correctness);
                summary_writer.add_row(row);
            },
            Err(e) => {
                error!("Error while evaluating contig: {e:#}");
                error_contigs += 1;
            }
        }
    }

    if error_contigs > 0 {
        error!("Failed to evaluate {error_contigs} (contig, decay) pairs.");
        std::process::exit(exitcode::DATAERR);
    }

    info!("Saving output summary to {:?}...", settings.output_filename);
    if let Err(e) = summary_writer.write_summary(&settings.output_filename) {
        error!("Error while saving summary file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    info!("Correctness evaluation completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Correctness(settings) => {
            run_correctness(*settings);
        }
    }

    info!("Process finished successfully.");
}
