//! Configuration management and validation.
//!
//! Provides the processing parameters shared by the point and polygon
//! pipelines: unit conversion, no-data handling, geometric policies and
//! concurrency limits.

use crate::constants::{MAX_DEFAULT_CONCURRENT_FILES, MILLIMETRES_PER_METRE, RAW_NODATA};
use crate::error::{Result, SnodasError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// What to do with a point that falls outside a raster's extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum OutOfExtentPolicy {
    /// Abort the run with an explicit error naming the point
    Error,
    /// Emit NaN for the point and log a warning
    Missing,
}

/// Global configuration for SNODAS processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnodasConfig {
    /// Divisor converting raw raster units to metres
    pub unit_divisor: f64,

    /// Raw no-data sentinel; compared after conversion
    pub nodata_value: f64,

    /// Policy for points outside the raster extent
    pub out_of_extent: OutOfExtentPolicy,

    /// Keep every cell touched by the boundary, not only cells whose centre is inside
    pub all_touched: bool,

    /// Maximum rasters decoded concurrently
    pub max_concurrent_files: usize,

    /// Overwrite existing outputs
    pub force_overwrite: bool,
}

impl Default for SnodasConfig {
    fn default() -> Self {
        Self {
            unit_divisor: MILLIMETRES_PER_METRE,
            nodata_value: RAW_NODATA,
            out_of_extent: OutOfExtentPolicy::Error,
            all_touched: false,
            max_concurrent_files: num_cpus::get().clamp(1, MAX_DEFAULT_CONCURRENT_FILES),
            force_overwrite: true,
        }
    }
}

impl SnodasConfig {
    /// Set the out-of-extent policy
    pub fn with_out_of_extent(mut self, policy: OutOfExtentPolicy) -> Self {
        self.out_of_extent = policy;
        self
    }

    /// Keep every cell touched by the boundary when clipping
    pub fn with_all_touched(mut self, all_touched: bool) -> Self {
        self.all_touched = all_touched;
        self
    }

    /// Set maximum concurrent raster decodes
    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files;
        self
    }

    /// Set the raw no-data sentinel
    pub fn with_nodata_value(mut self, nodata: f64) -> Self {
        self.nodata_value = nodata;
        self
    }

    /// Refuse to overwrite existing outputs
    pub fn without_overwrite(mut self) -> Self {
        self.force_overwrite = false;
        self
    }

    /// No-data sentinel expressed in output units (-9.999 for SNODAS)
    pub fn converted_sentinel(&self) -> f64 {
        self.nodata_value / self.unit_divisor
    }

    /// Convert a raw cell value to metres, mapping the sentinel to NaN
    pub fn convert(&self, raw: f64) -> f64 {
        let value = raw / self.unit_divisor;
        if value == self.converted_sentinel() {
            f64::NAN
        } else {
            value
        }
    }

    /// Fail if `path` exists and overwriting is disabled
    pub fn check_output(&self, path: &Path) -> Result<()> {
        if !self.force_overwrite && path.exists() {
            return Err(SnodasError::configuration(format!(
                "Output already exists and overwrite is disabled: {}",
                path.display()
            )));
        }
        Ok(())
    }

    /// Validate settings before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.unit_divisor.is_finite() || self.unit_divisor == 0.0 {
            return Err(SnodasError::configuration(format!(
                "Unit divisor must be a finite non-zero number, got {}",
                self.unit_divisor
            )));
        }

        if self.max_concurrent_files == 0 {
            return Err(SnodasError::configuration(
                "Maximum concurrent files must be greater than 0",
            ));
        }

        if self.max_concurrent_files > 64 {
            return Err(SnodasError::configuration(
                "Maximum concurrent files cannot exceed 64",
            ));
        }

        debug!(
            "Configuration validated: divisor={}, sentinel={}, policy={:?}",
            self.unit_divisor,
            self.converted_sentinel(),
            self.out_of_extent
        );
        Ok(())
    }
}
