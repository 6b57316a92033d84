//! Actions shared by the subcommands and the interactive menu.

use std::path::{Path, PathBuf};

use crime_dash_analytics::{run_view, sample_incidents};
use crime_dash_analytics_models::{TimeFilter, View, ViewOutcome};
use crime_dash_cli_utils::{IndicatifProgress, MultiProgress};
use crime_dash_database::store;
use crime_dash_forecast::ArimaOrder;
use crime_dash_ingest::pipeline;
use crime_dash_ingest_models::{LoadReport, NormalizeReport, PipelineConfig};
use serde::Serialize;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

fn print_normalize_report(report: &NormalizeReport, output: &Path) {
    println!("Normalized into {}:", output.display());
    for input in &report.inputs {
        println!(
            "  {:<48} {:>10} rows ({} malformed)",
            input.path.display(),
            input.rows_read,
            input.rows_malformed,
        );
    }
    println!(
        "  dropped {} bad timestamps and {} duplicates; wrote {} rows in {:.1}s",
        report.rows_bad_timestamp,
        report.rows_duplicate,
        report.rows_written,
        report.duration.as_secs_f64(),
    );
}

fn print_load_report(report: &LoadReport, store_path: &Path) {
    println!(
        "Loaded into {}: {} read, {} inserted, {} already stored, {} duplicates, {} without case number ({:.1}s)",
        store_path.display(),
        report.rows_read,
        report.rows_inserted,
        report.rows_skipped_existing,
        report.rows_duplicate_in_batch,
        report.rows_missing_key,
        report.duration.as_secs_f64(),
    );
}

/// Prints an outcome as JSON; error outcomes also fail the command.
fn print_outcome<T: Serialize>(outcome: &ViewOutcome<T>) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    match outcome {
        ViewOutcome::Error { kind, message } => Err(format!("{kind} error: {message}").into()),
        ViewOutcome::Data(_) | ViewOutcome::Empty => Ok(()),
    }
}

pub fn normalize(config: &PipelineConfig, multi: &MultiProgress) -> CommandResult {
    let progress = IndicatifProgress::files_bar(multi, "Normalizing");
    let report = crime_dash_normalize::normalize(&config.normalize_config(), &progress)?;
    print_normalize_report(&report, &config.normalized_output);
    Ok(())
}

pub fn concat(inputs: &[PathBuf], output: &Path, multi: &MultiProgress) -> CommandResult {
    let progress = IndicatifProgress::files_bar(multi, "Concatenating");
    let stats = crime_dash_normalize::concat_raw(inputs, output, &progress)?;
    let rows: u64 = stats.iter().map(|s| s.rows_read).sum();
    println!(
        "Wrote {rows} rows from {} files to {}",
        stats.len(),
        output.display()
    );
    Ok(())
}

pub fn provision(config: &PipelineConfig, recreate: bool) -> CommandResult {
    store::provision(&config.store_path, recreate)?;
    println!(
        "{} incidents table in {}",
        if recreate { "Recreated" } else { "Provisioned" },
        config.store_path.display()
    );
    Ok(())
}

pub fn load(config: &PipelineConfig, input: &Path, multi: &MultiProgress) -> CommandResult {
    let progress = IndicatifProgress::insert_bar(multi, "Loading");
    let report = crime_dash_ingest::load(&config.store_path, input, &progress)?;
    print_load_report(&report, &config.store_path);
    Ok(())
}

pub fn run(config: &PipelineConfig, recreate: bool, multi: &MultiProgress) -> CommandResult {
    let progress = IndicatifProgress::insert_bar(multi, "Running pipeline");
    let report = pipeline::run(config, recreate, &progress)?;
    print_normalize_report(&report.normalize, &config.normalized_output);
    print_load_report(&report.load, &config.store_path);
    Ok(())
}

pub fn view(
    config: &PipelineConfig,
    view: View,
    filter: &TimeFilter,
    order: ArimaOrder,
) -> CommandResult {
    log::info!("{} ({view})", view.title());
    print_outcome(&run_view(&config.store_path, view, filter, order))
}

pub fn sample(config: &PipelineConfig, limit: u32) -> CommandResult {
    print_outcome(&sample_incidents(&config.store_path, limit))
}

pub fn serve(config: &PipelineConfig) -> CommandResult {
    let store_path = config.store_path.clone();
    actix_web::rt::System::new().block_on(crime_dash_server::run_server(store_path))?;
    Ok(())
}
