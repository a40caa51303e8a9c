//! Core data structures and types for SNODAS processing.
//!
//! Defines selection frequencies, coordinate records, dated raster files and
//! the processing statistics reported by every pipeline.

use crate::constants::COLUMN_DATE_FORMAT;
use crate::error::{Result, SnodasError};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// How often raster files are selected when copying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
}

impl Frequency {
    /// Weekday selected by the weekly frequency
    pub const WEEKLY_WEEKDAY: Weekday = Weekday::Mon;

    /// Whether a file dated `date` is selected
    pub fn selects(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;

        match self {
            Frequency::Daily => true,
            Frequency::Weekly => date.weekday() == Self::WEEKLY_WEEKDAY,
        }
    }
}

impl FromStr for Frequency {
    type Err = SnodasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "daily" | "d" => Ok(Frequency::Daily),
            "weekly" | "w" => Ok(Frequency::Weekly),
            other => Err(SnodasError::configuration(format!(
                "Frequency must be either 'daily' or 'weekly' (or 'd', 'w'), got '{}'",
                other
            ))),
        }
    }
}

/// A labelled point location read from a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    pub id: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// A raster file with the date parsed from its name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatedRaster {
    pub date: NaiveDate,
    pub path: PathBuf,
}

impl DatedRaster {
    /// Output column name for this raster's date (`YYYY-MM-DD`)
    pub fn column_name(&self) -> String {
        date_column_name(self.date)
    }
}

/// Format a date as an output column name
pub fn date_column_name(date: NaiveDate) -> String {
    date.format(COLUMN_DATE_FORMAT).to_string()
}

/// Processing statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub total_rows: usize,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}
