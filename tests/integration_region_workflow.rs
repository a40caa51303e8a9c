//! Integration tests for the command-line region workflow
//!
//! Drives the subcommands the way the binary does: parse arguments with clap,
//! then dispatch through `commands::run`.

use clap::Parser;
use snodas_processor::cli::args::{Args, Commands};
use snodas_processor::cli::commands;
use snodas_processor::raster::write_geotiff;
use snodas_processor::{GeoTransform, RasterGrid, RegionDictionary, SnodasError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn parse(argv: &[&str]) -> Commands {
    let mut full = vec!["snodas-processor"];
    full.extend_from_slice(argv);
    Args::try_parse_from(full)
        .unwrap()
        .command
        .expect("subcommand")
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// 2x2 grid of 1 degree cells over (-121..-119, 44..46)
fn write_raster(dir: &Path, date: &str, values: [f64; 4]) {
    let grid = RasterGrid::new(
        2,
        2,
        GeoTransform::new(-121.0, 46.0, 1.0, -1.0),
        Some(-9999.0),
        values.to_vec(),
    )
    .unwrap();
    write_geotiff(&dir.join(format!("us_swe_{}_.tif", date)), &grid).unwrap();
}

fn write_catalogs(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("basinA.csv"),
        "station,Long,Lat,elevation\nA1,-120.5,45.5,2100\nA2,-119.5,44.5,1800\n",
    )
    .unwrap();
    fs::write(
        dir.join("basinB.csv"),
        "station,Long,Lat\nB1,-119.5,45.5\n",
    )
    .unwrap();
}

#[tokio::test]
async fn test_preprocess_extract_and_combine() {
    let temp_dir = TempDir::new().unwrap();
    let catalogs = temp_dir.path().join("catalogs");
    write_catalogs(&catalogs);

    let rasters = temp_dir.path().join("rasters");
    fs::create_dir_all(&rasters).unwrap();
    write_raster(&rasters, "20240108", [100.0, 200.0, 300.0, 400.0]);
    write_raster(&rasters, "20240101", [10.0, 20.0, 30.0, 40.0]);

    let prepared = temp_dir.path().join("prepared");
    let stats = commands::run(parse(&[
        "preprocess",
        path_str(&catalogs),
        "-o",
        path_str(&prepared),
        "-q",
    ]))
    .await
    .unwrap();
    assert_eq!(stats.total_rows, 3);
    assert!(prepared.join("merged_geo.json").exists());
    assert!(prepared.join("merged_data.csv").exists());
    let by_region = prepared.join("by_region");
    assert!(by_region.join("basinA_COORDS.csv").exists());

    let tables = temp_dir.path().join("tables");
    let parquet = temp_dir.path().join("regions.parquet");
    let stats = commands::run(parse(&[
        "extract-regions",
        path_str(&rasters),
        "-c",
        path_str(&by_region),
        "-o",
        path_str(&tables),
        "--combine",
        path_str(&parquet),
        "-q",
    ]))
    .await
    .unwrap();
    assert_eq!(stats.files_processed, 2);
    assert!(tables.join("basinA_COORDS_SNODAS_m.csv").exists());

    let dictionary = RegionDictionary::load(&parquet).unwrap();
    assert_eq!(dictionary.keys().collect::<Vec<_>>(), vec!["basinA", "basinB"]);

    let basin_a = dictionary.get("basinA").unwrap();
    assert_eq!(basin_a.height(), 2);
    let early = basin_a.column("2024-01-01").unwrap().f64().unwrap();
    assert_eq!(early.get(0), Some(0.01));
    assert_eq!(early.get(1), Some(0.04));
    let late = basin_a.column("2024-01-08").unwrap().f64().unwrap();
    assert_eq!(late.get(0), Some(0.1));

    let basin_b = dictionary.get("basinB").unwrap();
    let late = basin_b.column("2024-01-08").unwrap().f64().unwrap();
    assert_eq!(late.get(0), Some(0.2));
}

#[tokio::test]
async fn test_select_weekly_through_cli() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("downloads");
    fs::create_dir_all(&source).unwrap();
    for day in 1..=14 {
        fs::write(source.join(format!("us_swe_202401{:02}_.tif", day)), b"x").unwrap();
    }
    let dest = temp_dir.path().join("weekly");

    let stats = commands::run(parse(&[
        "select",
        path_str(&source),
        path_str(&dest),
        "-f",
        "weekly",
        "-q",
    ]))
    .await
    .unwrap();

    assert_eq!(stats.files_processed, 2);
    assert!(dest.join("us_swe_20240101_.tif").exists());
    assert!(dest.join("us_swe_20240108_.tif").exists());
}

#[tokio::test]
async fn test_select_rejects_unknown_frequency() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("downloads");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("us_swe_20240101_.tif"), b"x").unwrap();
    let dest = temp_dir.path().join("out");

    let result = commands::run(parse(&[
        "select",
        path_str(&source),
        path_str(&dest),
        "-f",
        "monthly",
        "-q",
    ]))
    .await;

    assert!(matches!(result, Err(SnodasError::Configuration { .. })));
    assert!(!dest.exists());
}
