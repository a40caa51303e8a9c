//! Point extraction pipeline.
//!
//! Samples SNODAS rasters at catalog point locations and assembles one
//! sample table per catalog with a column per raster date. Rasters are
//! decoded concurrently on the blocking pool, but results are consumed in
//! date order so that columns are appended strictly in sequence.

pub mod point;

#[cfg(test)]
pub mod tests;

pub use self::point::PointSampler;

use crate::catalog::{Catalog, load_catalog_dir};
use crate::config::SnodasConfig;
use crate::constants::{POINT_OUTPUT_SUFFIX, SINGLE_VALUE_COLUMN};
use crate::error::{Result, SnodasError};
use crate::filename::{DateConvention, discover_dated_rasters};
use crate::models::{CoordinateRecord, DatedRaster, ProcessingStats};
use crate::progress::file_progress;
use crate::raster::read_geotiff;
use crate::table::{SampleTable, convert_values};

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tracing::{debug, info, warn};

/// Tables produced by an extraction run, with the path each was written to
#[derive(Debug)]
pub struct PointExtraction {
    pub stats: ProcessingStats,
    pub tables: Vec<(PathBuf, SampleTable)>,
}

impl PointExtraction {
    /// The table written to `path`, if any
    pub fn table_for(&self, path: &Path) -> Option<&SampleTable> {
        self.tables
            .iter()
            .find(|(output, _)| output == path)
            .map(|(_, table)| table)
    }
}

/// Runs point extractions against raster files
#[derive(Debug, Clone)]
pub struct PointExtractor {
    config: SnodasConfig,
    sampler: PointSampler,
}

impl PointExtractor {
    pub fn new(config: SnodasConfig) -> Self {
        let sampler = PointSampler::new(config.out_of_extent);
        Self { config, sampler }
    }

    pub fn config(&self) -> &SnodasConfig {
        &self.config
    }

    /// Sample one raster at every catalog point into a `SNODAS_SWE_m` column
    pub async fn extract_single(
        &self,
        raster: &Path,
        catalog_csv: &Path,
        output_csv: &Path,
    ) -> Result<PointExtraction> {
        let start_time = Instant::now();
        self.config.validate()?;
        self.config.check_output(output_csv)?;

        let catalog = Catalog::load(catalog_csv)?;
        let records = vec![catalog.records().to_vec()];
        let raster_path = raster.to_path_buf();
        let sampler = self.sampler;
        let config = self.config.clone();

        let mut columns = task::spawn_blocking(move || {
            sample_raster(&raster_path, &records, sampler, &config)
        })
        .await
        .map_err(|e| SnodasError::ProcessingFailed {
            path: raster.to_path_buf(),
            reason: format!("sampling task failed: {}", e),
        })??;

        let mut table = SampleTable::new(catalog.frame().clone());
        table.append_column(SINGLE_VALUE_COLUMN, columns.remove(0))?;
        table.write_csv(output_csv)?;

        info!(
            "Sampled {} points from {} into {}",
            table.height(),
            raster.display(),
            output_csv.display()
        );

        Ok(PointExtraction {
            stats: ProcessingStats {
                files_processed: 1,
                total_rows: table.height(),
                output_path: output_csv.to_path_buf(),
                processing_time_ms: start_time.elapsed().as_millis(),
                ..Default::default()
            },
            tables: vec![(output_csv.to_path_buf(), table)],
        })
    }

    /// Sample every dated raster in `raster_dir` at one catalog's points
    pub async fn extract_conus(
        &self,
        raster_dir: &Path,
        catalog_csv: &Path,
        output_csv: &Path,
    ) -> Result<PointExtraction> {
        let start_time = Instant::now();
        self.config.validate()?;
        self.config.check_output(output_csv)?;

        let catalog = Catalog::load(catalog_csv)?;
        let (rasters, skipped) = discover_dated_rasters(raster_dir, DateConvention::Snodas)?;
        if rasters.is_empty() {
            warn!("No dated rasters found in {}", raster_dir.display());
        }

        let (mut tables, mut stats) = self.sample_series(&rasters, &[catalog]).await?;
        let mut table = tables.remove(0);
        table.write_csv(output_csv)?;

        stats.files_skipped += skipped;
        stats.output_path = output_csv.to_path_buf();
        stats.processing_time_ms = start_time.elapsed().as_millis();

        Ok(PointExtraction {
            stats,
            tables: vec![(output_csv.to_path_buf(), table)],
        })
    }

    /// Sample every dated raster in `raster_dir` at the points of every
    /// catalog in `catalog_dir`, writing `<stem>_SNODAS_m.csv` per catalog.
    /// Each raster is decoded once and sampled for all catalogs.
    pub async fn extract_regions(
        &self,
        raster_dir: &Path,
        catalog_dir: &Path,
        output_dir: &Path,
    ) -> Result<PointExtraction> {
        let start_time = Instant::now();
        self.config.validate()?;

        let (catalogs, failed_catalogs) = load_catalog_dir(catalog_dir)?;
        if catalogs.is_empty() {
            return Err(SnodasError::configuration(format!(
                "No readable catalogs found in {}",
                catalog_dir.display()
            )));
        }

        let outputs: Vec<PathBuf> = catalogs
            .iter()
            .map(|catalog| output_dir.join(region_output_name(&catalog.stem())))
            .collect();
        for output in &outputs {
            self.config.check_output(output)?;
        }

        let (rasters, skipped) = discover_dated_rasters(raster_dir, DateConvention::Snodas)?;
        if rasters.is_empty() {
            warn!("No dated rasters found in {}", raster_dir.display());
        }
        info!(
            "Sampling {} rasters for {} catalogs",
            rasters.len(),
            catalogs.len()
        );

        let (tables, mut stats) = self.sample_series(&rasters, &catalogs).await?;
        std::fs::create_dir_all(output_dir)?;

        let mut written = Vec::with_capacity(tables.len());
        for (output, mut table) in outputs.into_iter().zip(tables) {
            table.write_csv(&output)?;
            debug!("Wrote region table {}", output.display());
            written.push((output, table));
        }

        stats.files_skipped += skipped;
        stats.files_failed += failed_catalogs;
        stats.output_path = output_dir.to_path_buf();
        stats.processing_time_ms = start_time.elapsed().as_millis();

        Ok(PointExtraction {
            stats,
            tables: written,
        })
    }

    /// Sample `rasters` (already in date order) for every catalog, returning
    /// one table per catalog in the same order.
    async fn sample_series(
        &self,
        rasters: &[DatedRaster],
        catalogs: &[Catalog],
    ) -> Result<(Vec<SampleTable>, ProcessingStats)> {
        let mut tables: Vec<SampleTable> = catalogs
            .iter()
            .map(|catalog| SampleTable::new(catalog.frame().clone()))
            .collect();
        let coords: Arc<Vec<Vec<CoordinateRecord>>> = Arc::new(
            catalogs
                .iter()
                .map(|catalog| catalog.records().to_vec())
                .collect(),
        );

        let mut stats = ProcessingStats::default();
        let mut seen_dates = HashSet::new();
        let concurrent_limit = self.config.max_concurrent_files.min(rasters.len()).max(1);
        debug!("Sampling with concurrency {}", concurrent_limit);

        let pb = file_progress(rasters.len(), "Sampling rasters");

        let mut results = stream::iter(rasters.iter().cloned())
            .map(|raster| {
                let coords = Arc::clone(&coords);
                let sampler = self.sampler;
                let config = self.config.clone();
                async move {
                    let path = raster.path.clone();
                    let outcome = task::spawn_blocking(move || {
                        sample_raster(&path, &coords, sampler, &config)
                    })
                    .await;
                    (raster, outcome)
                }
            })
            .buffered(concurrent_limit);

        while let Some((raster, outcome)) = results.next().await {
            pb.inc(1);
            if let Some(file_name) = raster.path.file_name() {
                pb.set_message(format!("Sampled: {}", file_name.to_string_lossy()));
            }

            let columns = match outcome {
                Ok(Ok(columns)) => columns,
                Ok(Err(e)) if e.is_structural() => {
                    pb.abandon();
                    return Err(e);
                }
                Ok(Err(e)) => {
                    warn!("Failed to sample {}: {}", raster.path.display(), e);
                    stats.files_failed += 1;
                    continue;
                }
                Err(e) => {
                    pb.abandon();
                    return Err(SnodasError::ProcessingFailed {
                        path: raster.path.clone(),
                        reason: format!("sampling task failed: {}", e),
                    });
                }
            };

            if !seen_dates.insert(raster.date) {
                warn!(
                    "Skipping {}: date {} already sampled",
                    raster.path.display(),
                    raster.column_name()
                );
                stats.files_skipped += 1;
                continue;
            }

            for (table, values) in tables.iter_mut().zip(columns) {
                table.append_date(raster.date, values)?;
            }
            stats.files_processed += 1;
        }

        pb.finish_with_message("Sampling complete");
        stats.total_rows = tables.iter().map(SampleTable::height).sum();
        Ok((tables, stats))
    }
}

/// Decode one raster and sample it for each coordinate set, converted to metres
fn sample_raster(
    path: &Path,
    coords: &[Vec<CoordinateRecord>],
    sampler: PointSampler,
    config: &SnodasConfig,
) -> Result<Vec<Vec<f64>>> {
    let grid = read_geotiff(path)?;
    coords
        .iter()
        .map(|records| {
            let raw = sampler.sample(&grid, path, records)?;
            Ok(convert_values(&raw, config))
        })
        .collect()
}

/// Output file name for a region catalog stem
pub fn region_output_name(stem: &str) -> String {
    format!("{}{}.csv", stem, POINT_OUTPUT_SUFFIX)
}
