//! Copy SNODAS rasters into a working directory at a daily or weekly cadence.

use crate::error::{Result, SnodasError};
use crate::filename::{DateConvention, is_snodas_raster_name};
use crate::models::Frequency;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Counts from a selection run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectionStats {
    /// Files copied to the destination
    pub copied: usize,
    /// Matching files not on the selected weekday
    pub skipped: usize,
    /// Matching files whose embedded date could not be parsed
    pub invalid_dates: usize,
    /// Selected files that could not be copied
    pub failed: usize,
    pub destination: PathBuf,
    pub processing_time_ms: u128,
}

/// Copy every `us_swe_*.tif` in `source_dir` selected by `frequency` into
/// `destination_dir`, creating it if needed
pub fn select_files(
    source_dir: &Path,
    destination_dir: &Path,
    frequency: Frequency,
) -> Result<SelectionStats> {
    let start_time = Instant::now();

    if !source_dir.is_dir() {
        return Err(SnodasError::DirectoryNotFound {
            path: source_dir.to_path_buf(),
        });
    }
    std::fs::create_dir_all(destination_dir)?;

    let mut names: Vec<String> = WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| is_snodas_raster_name(name))
        .collect();
    names.sort();

    let mut stats = SelectionStats {
        destination: destination_dir.to_path_buf(),
        ..Default::default()
    };

    for name in names {
        let date = match DateConvention::Snodas.parse(&name) {
            Ok(date) => date,
            Err(e) => {
                warn!("Skipping file '{}' due to invalid date format: {}", name, e);
                stats.invalid_dates += 1;
                continue;
            }
        };

        if !frequency.selects(date) {
            stats.skipped += 1;
            continue;
        }

        if let Err(e) = std::fs::copy(source_dir.join(&name), destination_dir.join(&name)) {
            warn!("Failed to copy {}: {}", name, e);
            stats.failed += 1;
            continue;
        }
        debug!("Copied {}", name);
        stats.copied += 1;
    }

    stats.processing_time_ms = start_time.elapsed().as_millis();
    info!(
        "Copied {} files ({:?}) to {}, {} failed",
        stats.copied,
        frequency,
        destination_dir.display(),
        stats.failed
    );
    Ok(stats)
}
