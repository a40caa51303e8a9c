//! Error handling for SNODAS extraction operations.
//!
//! Provides error types with context for raster decoding, catalog loading,
//! geometric validation and table output failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnodasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Invalid date token in file name '{name}': {reason}")]
    InvalidDate { name: String, reason: String },

    #[error("Unsupported raster in file: {path} - {reason}")]
    UnsupportedRaster { path: PathBuf, reason: String },

    #[error("Missing column '{column}' in table: {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error(
        "Point '{id}' at ({longitude}, {latitude}) lies outside the extent of raster: {path}"
    )]
    OutOfExtent {
        id: String,
        longitude: f64,
        latitude: f64,
        path: PathBuf,
    },

    #[error(
        "Cell count mismatch between first file and file {file_index}: expected {expected} cells, found {found} ({path})"
    )]
    CellCountMismatch {
        file_index: usize,
        expected: usize,
        found: usize,
        path: PathBuf,
    },

    #[error("Grid mismatch between first file and file {file_index}: {reason} ({path})")]
    GridMismatch {
        file_index: usize,
        reason: String,
        path: PathBuf,
    },

    #[error("Column length mismatch for '{column}': table has {expected} rows, got {found} values")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Date column '{column}' already present in table")]
    DuplicateDate { column: String },

    #[error("Invalid boundary file: {path} - {reason}")]
    InvalidBoundary { path: PathBuf, reason: String },

    #[error("Boundary does not overlap raster: {path}")]
    NoOverlap { path: PathBuf },

    #[error("Region key '{key}' derived from both '{first}' and '{second}'")]
    RegionCollision {
        key: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },
}

impl SnodasError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Errors that corrupt the merge invariants and must abort a batch run
    /// rather than skip a single file.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SnodasError::OutOfExtent { .. }
                | SnodasError::CellCountMismatch { .. }
                | SnodasError::GridMismatch { .. }
                | SnodasError::ColumnLength { .. }
                | SnodasError::Configuration { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SnodasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_errors() {
        let mismatch = SnodasError::CellCountMismatch {
            file_index: 2,
            expected: 9,
            found: 6,
            path: PathBuf::from("b.tif"),
        };
        assert!(mismatch.is_structural());
        assert!(
            mismatch
                .to_string()
                .starts_with("Cell count mismatch between first file and file 2")
        );

        let skipped = SnodasError::InvalidDate {
            name: "us_swe_2024xx01_.tif".to_string(),
            reason: "not a date".to_string(),
        };
        assert!(!skipped.is_structural());
        assert!(!SnodasError::NoOverlap {
            path: PathBuf::from("a.tif")
        }
        .is_structural());
    }

    #[test]
    fn test_configuration_helper() {
        let error = SnodasError::configuration("bad frequency");
        assert!(matches!(error, SnodasError::Configuration { .. }));
        assert_eq!(error.to_string(), "Configuration error: bad frequency");
    }
}
