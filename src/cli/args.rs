//! Command-line argument definitions for the SNODAS processor
//!
//! Defines the complete CLI interface using the clap derive API: one
//! subcommand per pipeline stage, with shared logging and processing flags.

use crate::config::{OutOfExtentPolicy, SnodasConfig};
use crate::error::{Result, SnodasError};
use crate::models::Frequency;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// CLI arguments for the SNODAS snow water equivalent extractor
///
/// Extracts SWE time series from daily SNODAS GeoTIFFs at point locations or
/// within a polygon area of interest.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "snodas-processor",
    version,
    about = "Extract SNODAS snow water equivalent time series from GeoTIFF rasters",
    long_about = "Samples daily SNODAS SWE rasters at catalog point locations or within a \
                  polygon area of interest, converting millimetres to metres and masking the \
                  -9999 no-data sentinel, and assembles one column per date."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Copy SNODAS rasters into a working directory at a daily or weekly cadence
    Select(SelectArgs),
    /// Split region catalogs into coordinate files and merged GeoJSON/CSV views
    Preprocess(PreprocessArgs),
    /// Sample one raster at every point of a catalog
    ExtractSingle(ExtractSingleArgs),
    /// Sample a directory of rasters at every point of one catalog
    ExtractConus(ExtractConusArgs),
    /// Sample a directory of rasters for every region catalog in a directory
    ExtractRegions(ExtractRegionsArgs),
    /// Combine per-region tables into one Parquet region dictionary
    Combine(CombineArgs),
    /// Clip a directory of rasters to a polygon boundary
    Clip(ClipArgs),
    /// Flatten clipped rasters into a cell table with one column per date
    Flatten(FlattenArgs),
    /// Clip then flatten in one run
    Polygon(PolygonArgs),
}

/// Logging flags shared by every subcommand
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct LoggingArgs {
    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl LoggingArgs {
    /// Get the log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }

        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Whether progress bars and summaries should be shown
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

/// Processing flags for commands that read rasters
#[derive(Debug, Clone, ClapArgs)]
pub struct ProcessingArgs {
    /// Number of rasters decoded concurrently
    #[arg(
        short = 'j',
        long = "workers",
        value_name = "COUNT",
        default_value_t = SnodasConfig::default().max_concurrent_files,
        help = "Number of rasters decoded concurrently"
    )]
    pub workers: usize,

    /// What to do with points outside a raster's extent
    #[arg(
        long = "out-of-extent",
        value_enum,
        default_value = "error",
        help = "Policy for points outside the raster extent"
    )]
    pub out_of_extent: OutOfExtentPolicy,

    /// Refuse to overwrite existing outputs
    #[arg(long = "no-overwrite", help = "Fail instead of overwriting existing outputs")]
    pub no_overwrite: bool,
}

impl ProcessingArgs {
    /// Build the processing configuration from the flags
    pub fn to_config(&self) -> SnodasConfig {
        let config = SnodasConfig::default()
            .with_max_concurrent_files(self.workers)
            .with_out_of_extent(self.out_of_extent);

        if self.no_overwrite {
            config.without_overwrite()
        } else {
            config
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct SelectArgs {
    /// Directory holding the downloaded `us_swe_*.tif` rasters
    #[arg(value_name = "SOURCE_DIR")]
    pub source: PathBuf,

    /// Directory the selected rasters are copied into
    #[arg(value_name = "DEST_DIR")]
    pub destination: PathBuf,

    /// Selection cadence: daily (d) or weekly (w, Mondays only)
    #[arg(short = 'f', long = "frequency", default_value = "daily")]
    pub frequency: String,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl SelectArgs {
    /// Parse the frequency; an unknown value is an error before any file is copied
    pub fn frequency(&self) -> Result<Frequency> {
        self.frequency.parse()
    }

    pub fn validate(&self) -> Result<()> {
        self.frequency()?;
        require_dir(&self.source, "Source directory")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct PreprocessArgs {
    /// Directory of region catalog CSVs (region name = file stem)
    #[arg(value_name = "CATALOG_DIR")]
    pub catalogs: PathBuf,

    /// Output directory for by_region/, merged_geo.json and merged_data.csv
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: PathBuf,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl PreprocessArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.catalogs, "Catalog directory")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ExtractSingleArgs {
    /// Raster to sample
    #[arg(value_name = "RASTER")]
    pub raster: PathBuf,

    /// Catalog CSV with Long and Lat columns
    #[arg(short = 'c', long = "catalog", value_name = "CSV")]
    pub catalog: PathBuf,

    /// Output CSV
    #[arg(short = 'o', long = "output", value_name = "CSV")]
    pub output: PathBuf,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl ExtractSingleArgs {
    pub fn validate(&self) -> Result<()> {
        require_file(&self.raster, "Raster")?;
        require_file(&self.catalog, "Catalog")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ExtractConusArgs {
    /// Directory of dated SNODAS rasters
    #[arg(value_name = "RASTER_DIR")]
    pub rasters: PathBuf,

    /// Catalog CSV with Long and Lat columns
    #[arg(short = 'c', long = "catalog", value_name = "CSV")]
    pub catalog: PathBuf,

    /// Output CSV
    #[arg(short = 'o', long = "output", value_name = "CSV")]
    pub output: PathBuf,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl ExtractConusArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.rasters, "Raster directory")?;
        require_file(&self.catalog, "Catalog")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ExtractRegionsArgs {
    /// Directory of dated SNODAS rasters
    #[arg(value_name = "RASTER_DIR")]
    pub rasters: PathBuf,

    /// Directory of region catalog CSVs
    #[arg(short = 'c', long = "catalogs", value_name = "DIR")]
    pub catalogs: PathBuf,

    /// Output directory for `<region>_SNODAS_m.csv` tables
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,

    /// Also combine the region tables into this Parquet region dictionary
    #[arg(long = "combine", value_name = "PARQUET")]
    pub combine: Option<PathBuf>,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl ExtractRegionsArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.rasters, "Raster directory")?;
        require_dir(&self.catalogs, "Catalog directory")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct CombineArgs {
    /// Directory of per-region CSV tables
    #[arg(value_name = "TABLE_DIR")]
    pub tables: PathBuf,

    /// Output Parquet file
    #[arg(short = 'o', long = "output", value_name = "PARQUET")]
    pub output: PathBuf,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl CombineArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.tables, "Table directory")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ClipArgs {
    /// Directory of rasters to clip
    #[arg(value_name = "RASTER_DIR")]
    pub rasters: PathBuf,

    /// Boundary file (.shp, .geojson or .json)
    #[arg(short = 'b', long = "boundary", value_name = "FILE")]
    pub boundary: PathBuf,

    /// Output directory for `_clipped_*` rasters
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,

    /// Keep every cell the boundary touches, not only cells whose centre is inside
    #[arg(long = "all-touched")]
    pub all_touched: bool,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl ClipArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.rasters, "Raster directory")?;
        require_file(&self.boundary, "Boundary file")
    }

    pub fn to_config(&self) -> SnodasConfig {
        self.processing.to_config().with_all_touched(self.all_touched)
    }
}

#[derive(Debug, Clone, Parser)]
pub struct FlattenArgs {
    /// Directory of clipped rasters named `<prefix>_<YYYYMMDD>_<suffix>.tif`
    #[arg(value_name = "CLIPPED_DIR")]
    pub clipped: PathBuf,

    /// Output CSV
    #[arg(short = 'o', long = "output", value_name = "CSV")]
    pub output: PathBuf,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl FlattenArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.clipped, "Clipped raster directory")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct PolygonArgs {
    /// Directory of rasters to clip
    #[arg(value_name = "RASTER_DIR")]
    pub rasters: PathBuf,

    /// Boundary file (.shp, .geojson or .json)
    #[arg(short = 'b', long = "boundary", value_name = "FILE")]
    pub boundary: PathBuf,

    /// Directory for the intermediate clipped rasters
    #[arg(long = "clipped-dir", value_name = "DIR")]
    pub clipped: PathBuf,

    /// Output CSV
    #[arg(short = 'o', long = "output", value_name = "CSV")]
    pub output: PathBuf,

    /// Keep every cell the boundary touches, not only cells whose centre is inside
    #[arg(long = "all-touched")]
    pub all_touched: bool,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl PolygonArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.rasters, "Raster directory")?;
        require_file(&self.boundary, "Boundary file")
    }

    pub fn to_config(&self) -> SnodasConfig {
        self.processing.to_config().with_all_touched(self.all_touched)
    }
}

impl Commands {
    /// Logging flags of the selected subcommand
    pub fn logging(&self) -> &LoggingArgs {
        match self {
            Commands::Select(args) => &args.logging,
            Commands::Preprocess(args) => &args.logging,
            Commands::ExtractSingle(args) => &args.logging,
            Commands::ExtractConus(args) => &args.logging,
            Commands::ExtractRegions(args) => &args.logging,
            Commands::Combine(args) => &args.logging,
            Commands::Clip(args) => &args.logging,
            Commands::Flatten(args) => &args.logging,
            Commands::Polygon(args) => &args.logging,
        }
    }
}

fn require_dir(path: &Path, label: &str) -> Result<()> {
    if !path.exists() {
        return Err(SnodasError::configuration(format!(
            "{} does not exist: {}",
            label,
            path.display()
        )));
    }

    if !path.is_dir() {
        return Err(SnodasError::configuration(format!(
            "{} is not a directory: {}",
            label,
            path.display()
        )));
    }

    Ok(())
}

fn require_file(path: &Path, label: &str) -> Result<()> {
    if !path.is_file() {
        return Err(SnodasError::configuration(format!(
            "{} does not exist: {}",
            label,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_levels() {
        let mut logging = LoggingArgs::default();
        assert_eq!(logging.get_log_level(), "warn");
        logging.verbose = 2;
        assert_eq!(logging.get_log_level(), "debug");
        logging.verbose = 5;
        assert_eq!(logging.get_log_level(), "trace");
        logging.quiet = true;
        assert_eq!(logging.get_log_level(), "error");
        assert!(!logging.show_progress());
    }

    #[test]
    fn test_parse_extract_conus() {
        let args = Args::try_parse_from([
            "snodas-processor",
            "extract-conus",
            "/data/rasters",
            "--catalog",
            "points.csv",
            "-o",
            "out.csv",
            "-j",
            "2",
            "--out-of-extent",
            "missing",
            "-vv",
        ])
        .unwrap();

        match args.command.unwrap() {
            Commands::ExtractConus(conus) => {
                assert_eq!(conus.rasters, PathBuf::from("/data/rasters"));
                assert_eq!(conus.logging.verbose, 2);
                let config = conus.processing.to_config();
                assert_eq!(config.max_concurrent_files, 2);
                assert_eq!(config.out_of_extent, OutOfExtentPolicy::Missing);
                assert!(config.force_overwrite);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_polygon_all_touched() {
        let args = Args::try_parse_from([
            "snodas-processor",
            "polygon",
            "rasters",
            "-b",
            "aoi.shp",
            "--clipped-dir",
            "clipped",
            "-o",
            "cells.csv",
            "--all-touched",
            "--no-overwrite",
        ])
        .unwrap();

        match args.command.unwrap() {
            Commands::Polygon(polygon) => {
                let config = polygon.to_config();
                assert!(config.all_touched);
                assert!(!config.force_overwrite);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_select_rejects_unknown_frequency_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let args = SelectArgs {
            source: temp_dir.path().to_path_buf(),
            destination: temp_dir.path().join("dest"),
            frequency: "monthly".to_string(),
            logging: LoggingArgs::default(),
        };

        assert!(matches!(
            args.validate(),
            Err(SnodasError::Configuration { .. })
        ));
        assert!(!temp_dir.path().join("dest").exists());
    }

    #[test]
    fn test_validate_missing_paths() {
        let temp_dir = TempDir::new().unwrap();
        let args = ExtractConusArgs {
            rasters: temp_dir.path().join("missing"),
            catalog: temp_dir.path().join("points.csv"),
            output: temp_dir.path().join("out.csv"),
            processing: ProcessingArgs {
                workers: 1,
                out_of_extent: OutOfExtentPolicy::Error,
                no_overwrite: false,
            },
            logging: LoggingArgs::default(),
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_no_subcommand() {
        let args = Args::try_parse_from(["snodas-processor"]).unwrap();
        assert!(args.command.is_none());
    }
}
