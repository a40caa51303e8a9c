//! File selection, catalog preprocessing and region aggregation commands

use super::shared::{print_summary, setup_logging};
use crate::aggregate::combine_region_tables;
use crate::catalog::preprocess_catalogs;
use crate::cli::args::{CombineArgs, PreprocessArgs, SelectArgs};
use crate::error::{Result, SnodasError};
use crate::models::ProcessingStats;
use crate::selector::select_files;
use std::time::Instant;
use tracing::debug;

/// Copy rasters at the requested cadence
pub async fn run_select(args: SelectArgs) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;
    let frequency = args.frequency()?;

    let (source, destination) = (args.source.clone(), args.destination.clone());
    let selection =
        tokio::task::spawn_blocking(move || select_files(&source, &destination, frequency))
            .await
            .map_err(|e| SnodasError::ProcessingFailed {
                path: args.source.clone(),
                reason: format!("selection task failed: {}", e),
            })??;

    let stats = ProcessingStats {
        files_processed: selection.copied,
        files_skipped: selection.skipped + selection.invalid_dates,
        files_failed: selection.failed,
        output_path: selection.destination,
        processing_time_ms: selection.processing_time_ms,
        ..Default::default()
    };
    print_summary("File Selection Summary", &stats, &args.logging);
    Ok(stats)
}

/// Write per-region coordinate files and merged catalog views
pub async fn run_preprocess(args: PreprocessArgs) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let stats = preprocess_catalogs(&args.catalogs, &args.output)?;
    print_summary("Catalog Preprocessing Summary", &stats, &args.logging);
    Ok(stats)
}

/// Combine per-region tables into a Parquet region dictionary
pub async fn run_combine(args: CombineArgs) -> Result<ProcessingStats> {
    let start_time = Instant::now();
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let dictionary = combine_region_tables(&args.tables, &args.output)?;
    let total_rows = dictionary
        .keys()
        .filter_map(|region| dictionary.get(region))
        .map(|table| table.height())
        .sum();

    let stats = ProcessingStats {
        files_processed: dictionary.len(),
        total_rows,
        output_path: args.output.clone(),
        processing_time_ms: start_time.elapsed().as_millis(),
        ..Default::default()
    };
    print_summary("Region Aggregation Summary", &stats, &args.logging);
    Ok(stats)
}
