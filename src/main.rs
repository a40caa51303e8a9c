use anyhow::Context;
use clap::Parser;
use snodas_processor::cli::{
    args::{Args, Commands},
    commands,
};
use std::process;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    let Some(command) = args.command else {
        show_help_and_commands();
        process::exit(0);
    };

    if let Err(error) = run(command) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

/// Run one subcommand on a fresh runtime, stopping early on CTRL+C
fn run(command: Commands) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    runtime.block_on(async {
        tokio::select! {
            result = commands::run(command) => {
                result.context("Command failed")?;
                Ok::<(), anyhow::Error>(())
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for CTRL+C")?;
                eprintln!("\nReceived CTRL+C, shutting down...");
                anyhow::bail!("Processing interrupted by user")
            }
        }
    })
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("SNODAS Processor - Snow Water Equivalent Extractor");
    println!("==================================================");
    println!();
    println!("Extract SNODAS SWE time series from daily GeoTIFF rasters at point");
    println!("locations or within a polygon area of interest.");
    println!();
    println!("USAGE:");
    println!("    snodas-processor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    select            Copy rasters at a daily or weekly (Monday) cadence");
    println!("    preprocess        Split region catalogs into coordinate files");
    println!("    extract-single    Sample one raster at catalog points");
    println!("    extract-conus     Sample a raster directory at one catalog's points");
    println!("    extract-regions   Sample a raster directory for every region catalog");
    println!("    combine           Combine region tables into a Parquet dictionary");
    println!("    clip              Clip rasters to a polygon boundary");
    println!("    flatten           Flatten clipped rasters into a cell table");
    println!("    polygon           Clip then flatten in one run");
    println!();
    println!("EXAMPLES:");
    println!("    # Keep only Monday rasters:");
    println!("    snodas-processor select ./downloads ./weekly --frequency weekly");
    println!();
    println!("    # Per-region point time series, combined into one Parquet file:");
    println!("    snodas-processor extract-regions ./weekly -c ./prepared/by_region \\");
    println!("                                     -o ./region_out --combine regions.parquet");
    println!();
    println!("    # Area-of-interest cell time series:");
    println!("    snodas-processor polygon ./weekly -b basin.shp --clipped-dir ./clipped -o basin.csv");
    println!();
    println!("For detailed help on any command, use:");
    println!("    snodas-processor <COMMAND> --help");
}
