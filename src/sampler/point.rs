//! Nearest-cell point sampling.
//!
//! Maps each coordinate through the raster geotransform to the cell that
//! contains it and reads that cell's raw value. No interpolation.

use crate::config::OutOfExtentPolicy;
use crate::error::{Result, SnodasError};
use crate::models::CoordinateRecord;
use crate::raster::RasterGrid;
use std::path::Path;
use tracing::warn;

/// Samples raster cells under point locations
#[derive(Debug, Clone, Copy)]
pub struct PointSampler {
    policy: OutOfExtentPolicy,
}

impl PointSampler {
    pub fn new(policy: OutOfExtentPolicy) -> Self {
        Self { policy }
    }

    /// Raw cell values under `coords`, one per coordinate in input order.
    ///
    /// `source` names the raster in errors and warnings.
    pub fn sample(
        &self,
        grid: &RasterGrid,
        source: &Path,
        coords: &[CoordinateRecord],
    ) -> Result<Vec<f64>> {
        coords
            .iter()
            .map(|record| match grid.sample(record.longitude, record.latitude) {
                Some(value) => Ok(value),
                None => match self.policy {
                    OutOfExtentPolicy::Error => Err(SnodasError::OutOfExtent {
                        id: record.id.clone(),
                        longitude: record.longitude,
                        latitude: record.latitude,
                        path: source.to_path_buf(),
                    }),
                    OutOfExtentPolicy::Missing => {
                        warn!(
                            "Point '{}' at ({}, {}) is outside {}; recording NaN",
                            record.id,
                            record.longitude,
                            record.latitude,
                            source.display()
                        );
                        Ok(f64::NAN)
                    }
                },
            })
            .collect()
    }
}

impl Default for PointSampler {
    fn default() -> Self {
        Self::new(OutOfExtentPolicy::Error)
    }
}
