//! Point extraction commands

use super::shared::{print_summary, setup_logging};
use crate::aggregate::combine_region_tables;
use crate::cli::args::{ExtractConusArgs, ExtractRegionsArgs, ExtractSingleArgs};
use crate::error::Result;
use crate::models::ProcessingStats;
use crate::sampler::PointExtractor;
use colored::*;
use tracing::{debug, info};

/// Sample one raster at every catalog point
pub async fn run_extract_single(args: ExtractSingleArgs) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let extractor = PointExtractor::new(args.processing.to_config());
    let result = extractor
        .extract_single(&args.raster, &args.catalog, &args.output)
        .await?;

    print_summary("Single Raster Extraction", &result.stats, &args.logging);
    Ok(result.stats)
}

/// Sample a raster directory at one catalog's points
pub async fn run_extract_conus(args: ExtractConusArgs) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    info!(
        "Extracting {} at points from {}",
        args.rasters.display(),
        args.catalog.display()
    );
    let extractor = PointExtractor::new(args.processing.to_config());
    let result = extractor
        .extract_conus(&args.rasters, &args.catalog, &args.output)
        .await?;

    print_summary("Point Extraction Summary", &result.stats, &args.logging);
    Ok(result.stats)
}

/// Sample a raster directory for every region catalog, optionally combining
/// the outputs into a region dictionary
pub async fn run_extract_regions(args: ExtractRegionsArgs) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let extractor = PointExtractor::new(args.processing.to_config());
    let result = extractor
        .extract_regions(&args.rasters, &args.catalogs, &args.output)
        .await?;

    print_summary("Region Extraction Summary", &result.stats, &args.logging);

    if let Some(combined) = &args.combine {
        let dictionary = combine_region_tables(&args.output, combined)?;
        if args.logging.show_progress() {
            println!(
                "  {} {} regions -> {}",
                "Combined:".bright_cyan(),
                dictionary.len().to_string().bright_white().bold(),
                combined.display()
            );
        }
    }

    Ok(result.stats)
}
