//! Polygon area-of-interest pipeline.
//!
//! Clips every raster of a directory to a boundary, then flattens the
//! clipped grids into one table of cell centres with a column per date.

pub mod clip;
pub mod flatten;

pub use self::clip::{ClipOutcome, Clipper, clipped_name};
pub use self::flatten::{GridFlattener, ReferenceGrid, grid_values};

use crate::config::SnodasConfig;
use crate::error::{Result, SnodasError};
use crate::geometry::read_boundary;
use crate::models::ProcessingStats;
use crate::table::SampleTable;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;
use tracing::info;

/// Outputs of a clip + flatten run
#[derive(Debug)]
pub struct PolygonRun {
    pub clip: ClipOutcome,
    pub table: SampleTable,
    pub stats: ProcessingStats,
}

/// Runs the clip and flatten stages against a boundary file
#[derive(Debug, Clone)]
pub struct PolygonPipeline {
    config: SnodasConfig,
}

impl PolygonPipeline {
    pub fn new(config: SnodasConfig) -> Self {
        Self { config }
    }

    /// Clip every raster in `input_dir` into `clipped_dir`
    pub async fn clip_directory(
        &self,
        input_dir: &Path,
        clipped_dir: &Path,
        boundary_path: &Path,
    ) -> Result<ClipOutcome> {
        self.config.validate()?;
        let config = self.config.clone();
        let (input_dir, clipped_dir, boundary_path) = (
            input_dir.to_path_buf(),
            clipped_dir.to_path_buf(),
            boundary_path.to_path_buf(),
        );

        run_blocking(input_dir.clone(), move || {
            let boundary = read_boundary(&boundary_path)?;
            Clipper::new(boundary, &config).clip_directory(&input_dir, &clipped_dir)
        })
        .await
    }

    /// Flatten the dated rasters in `clipped_dir` into `output_csv`
    pub async fn flatten_directory(
        &self,
        clipped_dir: &Path,
        output_csv: &Path,
    ) -> Result<(SampleTable, ProcessingStats)> {
        self.config.validate()?;
        let flattener = GridFlattener::new(self.config.clone());
        let (clipped_dir, output_csv) = (clipped_dir.to_path_buf(), output_csv.to_path_buf());

        run_blocking(clipped_dir.clone(), move || {
            flattener.flatten_directory(&clipped_dir, &output_csv)
        })
        .await
    }

    /// Clip then flatten. An unreadable boundary fails before any raster is
    /// touched.
    pub async fn run(
        &self,
        input_dir: &Path,
        clipped_dir: &Path,
        boundary_path: &Path,
        output_csv: &Path,
    ) -> Result<PolygonRun> {
        let start_time = Instant::now();

        let clip = self
            .clip_directory(input_dir, clipped_dir, boundary_path)
            .await?;
        info!(
            "Clipped {} rasters ({} failed) into {}",
            clip.clipped.len(),
            clip.failures.len(),
            clipped_dir.display()
        );

        let (table, mut stats) = self.flatten_directory(clipped_dir, output_csv).await?;
        stats.files_failed += clip.failures.len();
        stats.processing_time_ms = start_time.elapsed().as_millis();

        Ok(PolygonRun { clip, table, stats })
    }
}

async fn run_blocking<T, F>(path: PathBuf, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|e| SnodasError::ProcessingFailed {
            path,
            reason: format!("worker task failed: {}", e),
        })?
}
