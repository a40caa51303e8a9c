//! Date extraction from raster file names.
//!
//! SNODAS rasters carry their date in the file name. Two conventions are in
//! use: the raw archive names (`us_swe_<YYYYMMDD>_...tif`), where the date is
//! the third underscore-delimited segment, and the more general
//! `<prefix>_<YYYYMMDD>_<suffix>` form used for clipped rasters, where the
//! date is the second-to-last segment.

use crate::constants::{FILE_DATE_FORMAT, RASTER_EXTENSION, SNODAS_FILE_PREFIX};
use crate::error::{Result, SnodasError};
use crate::models::DatedRaster;
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}$").expect("date token pattern is valid"));

/// Where the date token sits in a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateConvention {
    /// `us_swe_<YYYYMMDD>_...`: third segment
    Snodas,
    /// `<prefix>_<YYYYMMDD>_<suffix>`: second-to-last segment
    SecondToLast,
}

impl DateConvention {
    /// Extract and parse the date embedded in `file_name`
    pub fn parse(&self, file_name: &str) -> Result<NaiveDate> {
        let segments: Vec<&str> = file_name.split('_').collect();

        let token = match self {
            DateConvention::Snodas => segments.get(2).copied(),
            DateConvention::SecondToLast => segments
                .len()
                .checked_sub(2)
                .and_then(|index| segments.get(index))
                .copied(),
        };

        let token = token.ok_or_else(|| SnodasError::InvalidDate {
            name: file_name.to_string(),
            reason: "not enough underscore-delimited segments".to_string(),
        })?;

        parse_date_token(file_name, token)
    }
}

fn parse_date_token(file_name: &str, token: &str) -> Result<NaiveDate> {
    if !DATE_TOKEN.is_match(token) {
        return Err(SnodasError::InvalidDate {
            name: file_name.to_string(),
            reason: format!("'{}' is not an 8-digit YYYYMMDD token", token),
        });
    }

    NaiveDate::parse_from_str(token, FILE_DATE_FORMAT).map_err(|e| SnodasError::InvalidDate {
        name: file_name.to_string(),
        reason: e.to_string(),
    })
}

/// Whether a file name follows the `us_swe_*.tif` SNODAS convention
pub fn is_snodas_raster_name(file_name: &str) -> bool {
    file_name.starts_with(SNODAS_FILE_PREFIX) && file_name.ends_with(&format!(".{}", RASTER_EXTENSION))
}

/// Check if a path is a raster file
pub fn is_raster_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == RASTER_EXTENSION)
}

/// List the raster files of a directory with their parsed dates, sorted by
/// date. Files whose date cannot be parsed are skipped with a warning and
/// counted in the second return value.
pub fn discover_dated_rasters(
    dir: &Path,
    convention: DateConvention,
) -> Result<(Vec<DatedRaster>, usize)> {
    if !dir.is_dir() {
        return Err(SnodasError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let pattern = dir.join(format!("*.{}", RASTER_EXTENSION));
    let pattern_str = pattern.to_string_lossy();
    debug!("Searching for rasters with pattern: {}", pattern_str);

    let paths: Vec<PathBuf> = glob::glob(&pattern_str)
        .map_err(|e| SnodasError::configuration(format!("Invalid glob pattern: {}", e)))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Unreadable directory entry: {}", e);
                None
            }
        })
        .collect();

    let mut rasters = Vec::with_capacity(paths.len());
    let mut skipped = 0usize;

    for path in paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match convention.parse(&file_name) {
            Ok(date) => rasters.push(DatedRaster { date, path }),
            Err(e) => {
                warn!("Skipping file '{}' due to invalid date format: {}", file_name, e);
                skipped += 1;
            }
        }
    }

    rasters.sort();
    debug!(
        "Found {} dated rasters in {} ({} skipped)",
        rasters.len(),
        dir.display(),
        skipped
    );

    Ok((rasters, skipped))
}
