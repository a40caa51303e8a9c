//! Flatten clipped grids into a cell table and merge dates by position.
//!
//! The first raster (in date order) fixes the reference grid: its cell
//! centres become the `Long`/`Lat` rows. Every later raster must be
//! co-registered with it before its values are appended as a date column.

use crate::config::SnodasConfig;
use crate::constants::{LATITUDE_COLUMN, LONGITUDE_COLUMN};
use crate::error::{Result, SnodasError};
use crate::filename::{DateConvention, discover_dated_rasters};
use crate::models::{DatedRaster, ProcessingStats};
use crate::progress::file_progress;
use crate::raster::{RasterGrid, read_geotiff};
use crate::table::SampleTable;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shape and georeferencing every merged raster must share
#[derive(Debug, Clone)]
pub struct ReferenceGrid {
    grid: RasterGrid,
    path: PathBuf,
}

impl ReferenceGrid {
    pub fn new(grid: RasterGrid, path: PathBuf) -> Self {
        Self { grid, path }
    }

    pub fn cell_count(&self) -> usize {
        self.grid.cell_count()
    }

    /// Check `other` (the `file_index`-th file, 1-based) against the reference
    pub fn validate(&self, other: &RasterGrid, file_index: usize, path: &Path) -> Result<()> {
        if other.cell_count() != self.grid.cell_count() {
            return Err(SnodasError::CellCountMismatch {
                file_index,
                expected: self.grid.cell_count(),
                found: other.cell_count(),
                path: path.to_path_buf(),
            });
        }

        if (other.width, other.height) != (self.grid.width, self.grid.height) {
            return Err(SnodasError::GridMismatch {
                file_index,
                reason: format!(
                    "shape {}x{} differs from reference {}x{} ({})",
                    other.width,
                    other.height,
                    self.grid.width,
                    self.grid.height,
                    self.path.display()
                ),
                path: path.to_path_buf(),
            });
        }

        if !other.transform.approx_eq(&self.grid.transform) {
            return Err(SnodasError::GridMismatch {
                file_index,
                reason: format!(
                    "geotransform {:?} differs from reference {:?}",
                    other.transform, self.grid.transform
                ),
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    /// Row-major `Long`/`Lat` of every cell centre
    pub fn cell_frame(&self) -> Result<DataFrame> {
        let t = &self.grid.transform;
        let mut longitudes = Vec::with_capacity(self.cell_count());
        let mut latitudes = Vec::with_capacity(self.cell_count());

        for row in 0..self.grid.height {
            let latitude = t.cell_center_y(row);
            for col in 0..self.grid.width {
                longitudes.push(t.cell_center_x(col));
                latitudes.push(latitude);
            }
        }

        Ok(DataFrame::new(vec![
            Column::new(LONGITUDE_COLUMN.into(), longitudes),
            Column::new(LATITUDE_COLUMN.into(), latitudes),
        ])?)
    }
}

/// Grid values in metres: masked or no-data cells become NaN
pub fn grid_values(grid: &RasterGrid, config: &SnodasConfig) -> Vec<f64> {
    grid.cells()
        .iter()
        .map(|value| {
            if grid.is_nodata(value) {
                f64::NAN
            } else {
                config.convert(value)
            }
        })
        .collect()
}

/// Merge every dated clipped raster in a directory into one cell table
#[derive(Debug, Clone)]
pub struct GridFlattener {
    config: SnodasConfig,
}

impl GridFlattener {
    pub fn new(config: SnodasConfig) -> Self {
        Self { config }
    }

    /// Flatten all rasters in `clipped_dir` and write the table to `output_csv`
    pub fn flatten_directory(
        &self,
        clipped_dir: &Path,
        output_csv: &Path,
    ) -> Result<(SampleTable, ProcessingStats)> {
        let start_time = Instant::now();
        self.config.check_output(output_csv)?;

        let (rasters, skipped) = discover_dated_rasters(clipped_dir, DateConvention::SecondToLast)?;
        if rasters.is_empty() {
            return Err(SnodasError::ProcessingFailed {
                path: clipped_dir.to_path_buf(),
                reason: "no dated rasters to flatten".to_string(),
            });
        }

        let (mut table, mut stats) = self.flatten(&rasters)?;
        table.write_csv(output_csv)?;

        stats.files_skipped += skipped;
        stats.output_path = output_csv.to_path_buf();
        stats.processing_time_ms = start_time.elapsed().as_millis();

        info!(
            "Flattened {} rasters into {} cells x {} dates: {}",
            stats.files_processed,
            table.height(),
            table.dates().len(),
            output_csv.display()
        );
        Ok((table, stats))
    }

    /// Flatten rasters already sorted by date
    pub fn flatten(&self, rasters: &[DatedRaster]) -> Result<(SampleTable, ProcessingStats)> {
        let mut stats = ProcessingStats::default();
        let mut reference: Option<ReferenceGrid> = None;
        let mut table: Option<SampleTable> = None;
        let pb = file_progress(rasters.len(), "Flattening rasters");

        for (index, raster) in rasters.iter().enumerate() {
            let file_index = index + 1;
            pb.inc(1);

            let grid = match read_geotiff(&raster.path) {
                Ok(grid) => grid,
                Err(e) => {
                    warn!("Failed to read {}: {}", raster.path.display(), e);
                    stats.files_failed += 1;
                    continue;
                }
            };

            match &reference {
                Some(existing) => {
                    if let Err(e) = existing.validate(&grid, file_index, &raster.path) {
                        pb.abandon();
                        return Err(e);
                    }
                }
                None => {
                    debug!(
                        "Reference grid {}x{} from {}",
                        grid.width,
                        grid.height,
                        raster.path.display()
                    );
                    let first = ReferenceGrid::new(grid.clone(), raster.path.clone());
                    table = Some(SampleTable::new(first.cell_frame()?));
                    reference = Some(first);
                }
            }

            let Some(table) = table.as_mut() else {
                continue;
            };

            if table.dates().contains(&raster.date) {
                warn!(
                    "Skipping {}: date {} already merged",
                    raster.path.display(),
                    raster.column_name()
                );
                stats.files_skipped += 1;
                continue;
            }

            table.append_date(raster.date, grid_values(&grid, &self.config))?;
            stats.files_processed += 1;
        }

        pb.finish_with_message("Flattening complete");

        let table = table.ok_or_else(|| SnodasError::ProcessingFailed {
            path: rasters
                .first()
                .map(|r| r.path.clone())
                .unwrap_or_default(),
            reason: "no readable rasters to flatten".to_string(),
        })?;
        stats.total_rows = table.height();
        Ok((table, stats))
    }
}
