//! Clip rasters to a polygon boundary.
//!
//! A clip crops the grid to the cells selected by the boundary and masks
//! every unselected cell inside that window with the no-data value. A cell is
//! selected when its centre lies inside the boundary, or, with
//! `all_touched`, when its footprint intersects the boundary at all.

use crate::config::SnodasConfig;
use crate::constants::CLIPPED_PREFIX;
use crate::error::{Result, SnodasError};
use crate::filename::is_raster_file;
use crate::progress::file_progress;
use crate::raster::{RasterGrid, read_geotiff, write_geotiff};
use geo::{BoundingRect, Contains, Coord, Intersects, MultiPolygon, Point, Rect};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of clipping a directory of rasters
#[derive(Debug, Default)]
pub struct ClipOutcome {
    /// Clipped rasters written, in input name order
    pub clipped: Vec<PathBuf>,
    /// Inputs that could not be clipped
    pub failures: Vec<(PathBuf, SnodasError)>,
}

/// Clips grids to a fixed boundary
#[derive(Debug, Clone)]
pub struct Clipper {
    boundary: MultiPolygon<f64>,
    all_touched: bool,
    fallback_nodata: f64,
}

impl Clipper {
    pub fn new(boundary: MultiPolygon<f64>, config: &SnodasConfig) -> Self {
        Self {
            boundary,
            all_touched: config.all_touched,
            fallback_nodata: config.nodata_value,
        }
    }

    /// Clip a grid in memory. `None` when no cell is selected.
    pub fn clip_grid(&self, grid: &RasterGrid) -> Option<RasterGrid> {
        let bounds = self.boundary.bounding_rect()?;
        let (row_start, row_end, col_start, col_end) = window(grid, &bounds)?;
        let nodata = grid.nodata.unwrap_or(self.fallback_nodata);

        let mut selected = Vec::with_capacity((row_end - row_start) * (col_end - col_start));
        let mut kept = None::<(usize, usize, usize, usize)>;

        for row in row_start..row_end {
            for col in col_start..col_end {
                let inside = self.selects(grid, row, col);
                selected.push(inside);
                if inside {
                    kept = Some(match kept {
                        None => (row, row, col, col),
                        Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
                    });
                }
            }
        }

        let (r0, r1, c0, c1) = kept?;
        let window_width = col_end - col_start;
        let (width, height) = (c1 - c0 + 1, r1 - r0 + 1);
        let mut values = Vec::with_capacity(width * height);

        for row in r0..=r1 {
            for col in c0..=c1 {
                let in_window = (row - row_start) * window_width + (col - col_start);
                let value = if selected[in_window] {
                    grid.get(row as i64, col as i64).unwrap_or(nodata)
                } else {
                    nodata
                };
                values.push(value);
            }
        }

        RasterGrid::new(
            width,
            height,
            grid.transform.offset(r0, c0),
            Some(nodata),
            values,
        )
        .ok()
    }

    fn selects(&self, grid: &RasterGrid, row: usize, col: usize) -> bool {
        let t = &grid.transform;
        if self.all_touched {
            let corner = |r: usize, c: usize| Coord {
                x: t.origin_x + c as f64 * t.pixel_width,
                y: t.origin_y + r as f64 * t.pixel_height,
            };
            let footprint = Rect::new(corner(row, col), corner(row + 1, col + 1)).to_polygon();
            footprint.intersects(&self.boundary)
        } else {
            let centre = Point::new(t.cell_center_x(col), t.cell_center_y(row));
            self.boundary.contains(&centre)
        }
    }

    /// Clip one raster file and write the result to `output`
    pub fn clip_raster(&self, input: &Path, output: &Path) -> Result<()> {
        let grid = read_geotiff(input)?;
        let clipped = self.clip_grid(&grid).ok_or_else(|| SnodasError::NoOverlap {
            path: input.to_path_buf(),
        })?;

        debug!(
            "Clipped {} from {}x{} to {}x{} cells",
            input.display(),
            grid.width,
            grid.height,
            clipped.width,
            clipped.height
        );
        write_geotiff(output, &clipped)
    }

    /// Clip every raster in `input_dir` into `output_dir` as
    /// `_clipped_<name>`. A failing input is logged and recorded; the batch
    /// continues.
    pub fn clip_directory(&self, input_dir: &Path, output_dir: &Path) -> Result<ClipOutcome> {
        let inputs = list_rasters(input_dir)?;
        std::fs::create_dir_all(output_dir)?;

        let pb = file_progress(inputs.len(), "Clipping rasters");
        let mut outcome = ClipOutcome::default();

        for input in inputs {
            let output = output_dir.join(clipped_name(&input));
            match self.clip_raster(&input, &output) {
                Ok(()) => outcome.clipped.push(output),
                Err(e) => {
                    warn!("Failed to clip {}: {}", input.display(), e);
                    outcome.failures.push((input, e));
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message("Clipping complete");
        Ok(outcome)
    }
}

/// Grid window (rows, cols; end-exclusive) covering `bounds`, clamped to the grid
fn window(grid: &RasterGrid, bounds: &Rect<f64>) -> Option<(usize, usize, usize, usize)> {
    let t = &grid.transform;
    let cols = [
        (bounds.min().x - t.origin_x) / t.pixel_width,
        (bounds.max().x - t.origin_x) / t.pixel_width,
    ];
    let rows = [
        (bounds.min().y - t.origin_y) / t.pixel_height,
        (bounds.max().y - t.origin_y) / t.pixel_height,
    ];

    let span = |pair: [f64; 2], limit: usize| {
        let start = pair[0].min(pair[1]).floor().max(0.0) as usize;
        let end = (pair[0].max(pair[1]).ceil().max(0.0) as usize).min(limit);
        (start < end).then_some((start, end))
    };

    let (row_start, row_end) = span(rows, grid.height)?;
    let (col_start, col_end) = span(cols, grid.width)?;
    Some((row_start, row_end, col_start, col_end))
}

/// `_clipped_<original file name>`
pub fn clipped_name(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}{}", CLIPPED_PREFIX, name)
}

/// Raster files of a directory in name order
pub fn list_rasters(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SnodasError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_raster_file(path))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use geo::polygon;
    use tempfile::TempDir;

    /// 4x4 grid of unit cells, upper-left at (0, 4), values 1..=16
    fn grid() -> RasterGrid {
        RasterGrid::new(
            4,
            4,
            GeoTransform::new(0.0, 4.0, 1.0, -1.0),
            Some(-9999.0),
            (1..=16).map(f64::from).collect(),
        )
        .unwrap()
    }

    fn boundary(points: &[(f64, f64)]) -> MultiPolygon<f64> {
        let exterior: Vec<Coord<f64>> = points.iter().map(|&(x, y)| Coord { x, y }).collect();
        MultiPolygon::new(vec![geo::Polygon::new(exterior.into(), vec![])])
    }

    #[test]
    fn test_clip_square_crops_to_selected_cells() {
        // Covers the centres of cells (row 1..=2, col 1..=2)
        let aoi = boundary(&[(1.2, 1.2), (2.8, 1.2), (2.8, 2.8), (1.2, 2.8), (1.2, 1.2)]);
        let clipper = Clipper::new(aoi, &SnodasConfig::default());

        let clipped = clipper.clip_grid(&grid()).unwrap();
        assert_eq!((clipped.width, clipped.height), (2, 2));
        assert_eq!(clipped.cells().iter().collect::<Vec<_>>(), &[6.0, 7.0, 10.0, 11.0]);
        assert_eq!(clipped.transform.origin_x, 1.0);
        assert_eq!(clipped.transform.origin_y, 3.0);
    }

    #[test]
    fn test_triangle_masks_cells_outside() {
        let aoi: MultiPolygon<f64> = polygon![
            (x: 0.0, y: 4.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 0.0),
        ]
        .into();
        let clipper = Clipper::new(aoi, &SnodasConfig::default());

        let clipped = clipper.clip_grid(&grid()).unwrap();
        assert_eq!((clipped.width, clipped.height), (3, 3));
        // Upper-left triangle of centres kept, the rest masked
        assert_eq!(
            clipped.cells().iter().collect::<Vec<_>>(),
            &[1.0, 2.0, 3.0, 5.0, 6.0, -9999.0, 9.0, -9999.0, -9999.0]
        );
        assert_eq!(clipped.nodata, Some(-9999.0));
    }

    #[test]
    fn test_all_touched_keeps_partial_cells() {
        // Small square inside cell (row 0, col 0) that misses its centre
        let aoi = boundary(&[(0.1, 3.6), (0.3, 3.6), (0.3, 3.9), (0.1, 3.9), (0.1, 3.6)]);

        let centre_only = Clipper::new(aoi.clone(), &SnodasConfig::default());
        assert!(centre_only.clip_grid(&grid()).is_none());

        let touched = Clipper::new(aoi, &SnodasConfig::default().with_all_touched(true));
        let clipped = touched.clip_grid(&grid()).unwrap();
        assert_eq!(clipped.cells().iter().collect::<Vec<_>>(), &[1.0]);
    }

    #[test]
    fn test_no_overlap() {
        let aoi = boundary(&[(10.0, 10.0), (11.0, 10.0), (11.0, 11.0), (10.0, 11.0), (10.0, 10.0)]);
        let clipper = Clipper::new(aoi, &SnodasConfig::default());
        assert!(clipper.clip_grid(&grid()).is_none());
    }

    #[test]
    fn test_clip_directory_names_and_failures() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        write_geotiff(&input.join("us_swe_20240101_.tif"), &grid()).unwrap();
        std::fs::write(input.join("us_swe_20240102_.tif"), b"broken").unwrap();
        std::fs::write(input.join("readme.txt"), b"ignored").unwrap();

        let aoi = boundary(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let clipper = Clipper::new(aoi, &SnodasConfig::default());
        let output = temp_dir.path().join("clipped");
        let outcome = clipper.clip_directory(&input, &output).unwrap();

        assert_eq!(
            outcome.clipped,
            vec![output.join("_clipped_us_swe_20240101_.tif")]
        );
        assert_eq!(outcome.failures.len(), 1);

        let written = read_geotiff(&outcome.clipped[0]).unwrap();
        assert_eq!(written.cell_count(), 16);
    }
}
