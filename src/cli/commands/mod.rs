//! Command implementations for the SNODAS processor CLI
//!
//! Each subcommand sets up logging, validates its arguments, runs one
//! library pipeline and prints a coloured summary.

pub mod catalog;
pub mod extract;
pub mod polygon;
pub mod shared;

use crate::cli::args::Commands;
use crate::error::Result;
use crate::models::ProcessingStats;

/// Dispatch to the handler of the selected subcommand
pub async fn run(command: Commands) -> Result<ProcessingStats> {
    match command {
        Commands::Select(args) => catalog::run_select(args).await,
        Commands::Preprocess(args) => catalog::run_preprocess(args).await,
        Commands::ExtractSingle(args) => extract::run_extract_single(args).await,
        Commands::ExtractConus(args) => extract::run_extract_conus(args).await,
        Commands::ExtractRegions(args) => extract::run_extract_regions(args).await,
        Commands::Combine(args) => catalog::run_combine(args).await,
        Commands::Clip(args) => polygon::run_clip(args).await,
        Commands::Flatten(args) => polygon::run_flatten(args).await,
        Commands::Polygon(args) => polygon::run_polygon(args).await,
    }
}
