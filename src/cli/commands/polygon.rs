//! Polygon clip and flatten commands

use super::shared::{print_summary, setup_logging};
use crate::cli::args::{ClipArgs, FlattenArgs, PolygonArgs};
use crate::error::Result;
use crate::models::ProcessingStats;
use crate::polygon::PolygonPipeline;
use colored::*;
use std::time::Instant;
use tracing::debug;

/// Clip a raster directory to a boundary
pub async fn run_clip(args: ClipArgs) -> Result<ProcessingStats> {
    let start_time = Instant::now();
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let outcome = PolygonPipeline::new(args.to_config())
        .clip_directory(&args.rasters, &args.output, &args.boundary)
        .await?;

    if args.logging.show_progress() {
        for (path, error) in &outcome.failures {
            println!(
                "  {} {}: {}",
                "Not clipped".bright_red(),
                path.display(),
                error
            );
        }
    }

    let stats = ProcessingStats {
        files_processed: outcome.clipped.len(),
        files_failed: outcome.failures.len(),
        output_path: args.output.clone(),
        processing_time_ms: start_time.elapsed().as_millis(),
        ..Default::default()
    };
    print_summary("Clip Summary", &stats, &args.logging);
    Ok(stats)
}

/// Flatten clipped rasters into a cell table
pub async fn run_flatten(args: FlattenArgs) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let (_, stats) = PolygonPipeline::new(args.processing.to_config())
        .flatten_directory(&args.clipped, &args.output)
        .await?;

    print_summary("Flatten Summary", &stats, &args.logging);
    Ok(stats)
}

/// Clip then flatten
pub async fn run_polygon(args: PolygonArgs) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let run = PolygonPipeline::new(args.to_config())
        .run(&args.rasters, &args.clipped, &args.boundary, &args.output)
        .await?;

    print_summary("Polygon Extraction Summary", &run.stats, &args.logging);
    Ok(run.stats)
}
