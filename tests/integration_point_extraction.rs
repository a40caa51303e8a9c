//! Integration tests for point extraction
//!
//! Builds small SNODAS-named GeoTIFFs and catalogs on disk and runs the full
//! extraction workflows through the public API.

use snodas_processor::raster::write_geotiff;
use snodas_processor::{
    GeoTransform, OutOfExtentPolicy, PointExtractor, RasterGrid, SnodasConfig, SnodasError,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Three cells in a row, 0.1 degree resolution, north-west corner at (-105, 40)
fn write_row_raster(dir: &Path, name: &str, values: [f64; 3]) {
    let grid = RasterGrid::new(
        3,
        1,
        GeoTransform::new(-105.0, 40.0, 0.1, -0.1),
        Some(-9999.0),
        values.to_vec(),
    )
    .unwrap();
    write_geotiff(&dir.join(name), &grid).unwrap();
}

fn write_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("sites.csv");
    fs::write(
        &path,
        "site_id,Long,Lat,name\n\
         101,-104.95,39.95,upper\n\
         102,-104.85,39.95,middle\n\
         103,-104.75,39.95,lower\n",
    )
    .unwrap();
    path
}

#[tokio::test]
async fn test_three_points_two_dates() {
    let temp_dir = TempDir::new().unwrap();
    let rasters = temp_dir.path().join("weekly");
    fs::create_dir_all(&rasters).unwrap();
    write_row_raster(&rasters, "us_swe_20240101_.tif", [1000.0, 2000.0, -9999.0]);
    write_row_raster(&rasters, "us_swe_20240102_.tif", [1500.0, -9999.0, 3000.0]);
    let catalog = write_catalog(temp_dir.path());
    let output = temp_dir.path().join("sites_SNODAS_m.csv");

    let result = PointExtractor::new(SnodasConfig::default())
        .extract_conus(&rasters, &catalog, &output)
        .await
        .unwrap();

    let table = &result.tables[0].1;
    let first = table.column_values("2024-01-01").unwrap();
    let second = table.column_values("2024-01-02").unwrap();

    assert_eq!(&first[..2], &[1.0, 2.0]);
    assert!(first[2].is_nan());
    assert_eq!(second[0], 1.5);
    assert!(second[1].is_nan());
    assert_eq!(second[2], 3.0);

    // Catalog columns are carried through ahead of the date columns
    let header = fs::read_to_string(&output).unwrap();
    let header = header.lines().next().unwrap();
    assert_eq!(header, "site_id,Long,Lat,name,2024-01-01,2024-01-02");
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let temp_dir = TempDir::new().unwrap();
    let rasters = temp_dir.path().join("daily");
    fs::create_dir_all(&rasters).unwrap();
    write_row_raster(&rasters, "us_swe_20240301_.tif", [12.0, 34.0, 56.0]);
    let catalog = write_catalog(temp_dir.path());

    let extractor = PointExtractor::new(SnodasConfig::default());
    let first_csv = temp_dir.path().join("first.csv");
    let second_csv = temp_dir.path().join("second.csv");
    extractor
        .extract_conus(&rasters, &catalog, &first_csv)
        .await
        .unwrap();
    extractor
        .extract_conus(&rasters, &catalog, &second_csv)
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(first_csv).unwrap(),
        fs::read_to_string(second_csv).unwrap()
    );
}

#[tokio::test]
async fn test_out_of_extent_policies() {
    let temp_dir = TempDir::new().unwrap();
    let rasters = temp_dir.path().join("rasters");
    fs::create_dir_all(&rasters).unwrap();
    write_row_raster(&rasters, "us_swe_20240101_.tif", [1.0, 2.0, 3.0]);
    let catalog = temp_dir.path().join("outside.csv");
    fs::write(&catalog, "site_id,Long,Lat\n1,-104.95,39.95\n2,-90.0,39.95\n").unwrap();

    let strict = PointExtractor::new(SnodasConfig::default())
        .extract_conus(&rasters, &catalog, &temp_dir.path().join("strict.csv"))
        .await;
    assert!(matches!(strict, Err(SnodasError::OutOfExtent { .. })));

    let lenient = PointExtractor::new(
        SnodasConfig::default().with_out_of_extent(OutOfExtentPolicy::Missing),
    )
    .extract_conus(&rasters, &catalog, &temp_dir.path().join("lenient.csv"))
    .await
    .unwrap();
    let values = lenient.tables[0].1.column_values("2024-01-01").unwrap();
    assert_eq!(values[0], 0.001);
    assert!(values[1].is_nan());
}

#[tokio::test]
async fn test_catalog_without_coordinates_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let rasters = temp_dir.path().join("rasters");
    fs::create_dir_all(&rasters).unwrap();
    let catalog = temp_dir.path().join("bad.csv");
    fs::write(&catalog, "site_id,x,y\n1,-104.95,39.95\n").unwrap();

    let result = PointExtractor::new(SnodasConfig::default())
        .extract_conus(&rasters, &catalog, &temp_dir.path().join("out.csv"))
        .await;
    assert!(matches!(result, Err(SnodasError::MissingColumn { .. })));
}
