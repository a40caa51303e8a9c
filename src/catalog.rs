//! Point catalogs and catalog preprocessing.
//!
//! A catalog is a CSV of labelled point locations with `Long` and `Lat`
//! columns; its first column is the row identifier. Extra columns are kept
//! and carried through to every sample table built from the catalog.

use crate::constants::{
    BY_REGION_DIR, COORDS_SUFFIX, GEOMETRY_COLUMN, IDENTIFIER_COLUMN, LATITUDE_COLUMN,
    LONGITUDE_COLUMN, MERGED_CSV_FILE, MERGED_GEOJSON_FILE, REGION_COLUMN,
};
use crate::error::{Result, SnodasError};
use crate::geometry::{PointFeature, PointFeatureCollection, point_wkt};
use crate::models::{CoordinateRecord, ProcessingStats};
use crate::table::{read_csv, write_csv};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A loaded point catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    frame: DataFrame,
    records: Vec<CoordinateRecord>,
}

impl Catalog {
    /// Load a catalog CSV, requiring `Long` and `Lat` columns
    pub fn load(path: &Path) -> Result<Self> {
        let frame = read_csv(path)?;
        Self::from_frame(path, frame)
    }

    /// Build a catalog from an already-read frame
    pub fn from_frame(path: &Path, frame: DataFrame) -> Result<Self> {
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        for required in [LONGITUDE_COLUMN, LATITUDE_COLUMN] {
            if !names.iter().any(|name| name == required) {
                return Err(SnodasError::MissingColumn {
                    path: path.to_path_buf(),
                    column: required.to_string(),
                });
            }
        }

        let id_column = frame.get_columns()[0].cast(&DataType::String)?;
        let longitudes = frame.column(LONGITUDE_COLUMN)?.cast(&DataType::Float64)?;
        let latitudes = frame.column(LATITUDE_COLUMN)?.cast(&DataType::Float64)?;

        let ids = id_column.str()?;
        let longitudes = longitudes.f64()?;
        let latitudes = latitudes.f64()?;

        let mut records = Vec::with_capacity(frame.height());
        for (row, ((id, longitude), latitude)) in ids
            .into_iter()
            .zip(longitudes.into_iter())
            .zip(latitudes.into_iter())
            .enumerate()
        {
            let (longitude, latitude) = match (longitude, latitude) {
                (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => (lon, lat),
                _ => {
                    return Err(SnodasError::ProcessingFailed {
                        path: path.to_path_buf(),
                        reason: format!("row {} has no valid coordinate", row + 1),
                    });
                }
            };

            records.push(CoordinateRecord {
                id: id.map(str::to_string).unwrap_or_else(|| row.to_string()),
                longitude,
                latitude,
            });
        }

        debug!(
            "Loaded catalog {} with {} points and {} columns",
            path.display(),
            records.len(),
            frame.width()
        );

        Ok(Self {
            path: path.to_path_buf(),
            frame,
            records,
        })
    }

    /// Catalog columns in file order
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn records(&self) -> &[CoordinateRecord] {
        &self.records
    }

    /// Name of the identifier column (the first column)
    pub fn id_column(&self) -> String {
        self.frame.get_columns()[0].name().to_string()
    }

    /// File stem, used as the region key
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// List the CSV files of a directory in name order
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SnodasError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let pattern = dir.join("*.csv");
    let pattern_str = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&pattern_str)
        .map_err(|e| SnodasError::configuration(format!("Invalid glob pattern: {}", e)))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();

    files.sort();
    debug!("Found {} CSV files in {}", files.len(), dir.display());
    Ok(files)
}

/// Load every catalog in a directory. A catalog that cannot be read is
/// skipped with a warning; a catalog missing `Long`/`Lat` is an error.
pub fn load_catalog_dir(dir: &Path) -> Result<(Vec<Catalog>, usize)> {
    let mut catalogs = Vec::new();
    let mut failed = 0usize;

    for path in discover_csv_files(dir)? {
        match Catalog::load(&path) {
            Ok(catalog) => catalogs.push(catalog),
            Err(e @ SnodasError::MissingColumn { .. }) => return Err(e),
            Err(e) => {
                warn!("Skipping unreadable catalog {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    Ok((catalogs, failed))
}

/// Split a directory of region catalogs into per-region coordinate files and
/// write the merged GeoJSON and CSV views.
///
/// Writes, under `output_dir`:
/// - `by_region/<region>_COORDS.csv` with identifier, `Long` and `Lat`
/// - `merged_geo.json`, a point FeatureCollection of every location
/// - `merged_data.csv` with `id`, `Long`, `Lat`, `region` and a WKT
///   `geometry` column
pub fn preprocess_catalogs(catalog_dir: &Path, output_dir: &Path) -> Result<ProcessingStats> {
    let start_time = Instant::now();
    let (catalogs, failed) = load_catalog_dir(catalog_dir)?;

    if catalogs.is_empty() {
        return Err(SnodasError::configuration(format!(
            "No readable catalogs found in {}",
            catalog_dir.display()
        )));
    }

    let by_region = output_dir.join(BY_REGION_DIR);
    std::fs::create_dir_all(&by_region)?;

    let mut collection = PointFeatureCollection::new();
    let mut ids = Vec::new();
    let mut longitudes = Vec::new();
    let mut latitudes = Vec::new();
    let mut regions = Vec::new();
    let mut geometries = Vec::new();

    for catalog in &catalogs {
        let region = catalog.stem();
        let mut coords = catalog.frame().select([
            catalog.id_column(),
            LONGITUDE_COLUMN.to_string(),
            LATITUDE_COLUMN.to_string(),
        ])?;
        let coords_path = by_region.join(format!("{}{}.csv", region, COORDS_SUFFIX));
        write_csv(&mut coords, &coords_path)?;
        debug!(
            "Wrote {} coordinates for region '{}' to {}",
            coords.height(),
            region,
            coords_path.display()
        );

        for record in catalog.records() {
            collection = collection.with_feature(
                PointFeature::point(record.longitude, record.latitude)
                    .with_property(IDENTIFIER_COLUMN, record.id.clone())
                    .with_property(REGION_COLUMN, region.clone()),
            );
            ids.push(record.id.clone());
            longitudes.push(record.longitude);
            latitudes.push(record.latitude);
            regions.push(region.clone());
            geometries.push(point_wkt(record.longitude, record.latitude));
        }
    }

    collection.write(&output_dir.join(MERGED_GEOJSON_FILE))?;

    let total_rows = ids.len();
    let mut merged = DataFrame::new(vec![
        Column::new(IDENTIFIER_COLUMN.into(), ids),
        Column::new(LONGITUDE_COLUMN.into(), longitudes),
        Column::new(LATITUDE_COLUMN.into(), latitudes),
        Column::new(REGION_COLUMN.into(), regions),
        Column::new(GEOMETRY_COLUMN.into(), geometries),
    ])?;
    write_csv(&mut merged, &output_dir.join(MERGED_CSV_FILE))?;

    info!(
        "Preprocessed {} catalogs ({} points) into {}",
        catalogs.len(),
        total_rows,
        output_dir.display()
    );

    Ok(ProcessingStats {
        files_processed: catalogs.len(),
        files_skipped: 0,
        files_failed: failed,
        total_rows,
        output_path: output_dir.to_path_buf(),
        processing_time_ms: start_time.elapsed().as_millis(),
    })
}
