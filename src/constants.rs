//! Application constants for SNODAS processor
//!
//! File naming conventions, unit conversion factors and the column names
//! shared by every pipeline.

// =============================================================================
// File Naming
// =============================================================================

/// Prefix of every SNODAS SWE raster file name
pub const SNODAS_FILE_PREFIX: &str = "us_swe_";

/// Extension of raster files handled by the pipelines
pub const RASTER_EXTENSION: &str = "tif";

/// Prefix prepended to clipped raster file names
pub const CLIPPED_PREFIX: &str = "_clipped_";

/// Suffix appended to per-catalog point outputs (before `.csv`)
pub const POINT_OUTPUT_SUFFIX: &str = "_SNODAS_m";

/// Suffix of per-region coordinate files written by preprocessing
pub const COORDS_SUFFIX: &str = "_COORDS";

/// Format of the date token embedded in raster file names
pub const FILE_DATE_FORMAT: &str = "%Y%m%d";

/// Format of the per-date column names in output tables
pub const COLUMN_DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Table Columns
// =============================================================================

pub const LONGITUDE_COLUMN: &str = "Long";
pub const LATITUDE_COLUMN: &str = "Lat";

/// Identifier column of the merged catalog outputs
pub const IDENTIFIER_COLUMN: &str = "id";

/// Value column written by single-raster point extraction
pub const SINGLE_VALUE_COLUMN: &str = "SNODAS_SWE_m";

/// Region label column in merged and aggregated outputs
pub const REGION_COLUMN: &str = "region";

/// Parquet metadata key holding each region's column list and types
pub const REGION_SCHEMA_KEY: &str = "snodas_region_schema";

/// WKT geometry column in the merged catalog CSV
pub const GEOMETRY_COLUMN: &str = "geometry";

// =============================================================================
// Units and Sentinels
// =============================================================================

/// Raw SNODAS SWE is stored in millimetres
pub const MILLIMETRES_PER_METRE: f64 = 1000.0;

/// Raw no-data sentinel written by SNODAS
pub const RAW_NODATA: f64 = -9999.0;

// =============================================================================
// Output Files
// =============================================================================

pub const BY_REGION_DIR: &str = "by_region";
pub const MERGED_GEOJSON_FILE: &str = "merged_geo.json";
pub const MERGED_CSV_FILE: &str = "merged_data.csv";

// =============================================================================
// Performance
// =============================================================================

/// Upper bound on concurrently decoded rasters
pub const MAX_DEFAULT_CONCURRENT_FILES: usize = 4;

/// Tolerance when comparing geotransforms of co-registered rasters
pub const GEOTRANSFORM_TOLERANCE: f64 = 1e-9;
