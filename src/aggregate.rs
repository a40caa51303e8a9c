//! Region dictionary: every per-region sample table under one roof.
//!
//! Tables are keyed by region name and persisted together as a single
//! Parquet file, diagonally concatenated with a `region` column. The column
//! list and types of each region are kept in the file's key-value metadata.

use crate::catalog::discover_csv_files;
use crate::constants::{COORDS_SUFFIX, POINT_OUTPUT_SUFFIX, REGION_COLUMN, REGION_SCHEMA_KEY};
use crate::error::{Result, SnodasError};
use crate::table::read_csv;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Region key for a table file stem: `_SNODAS_m` is stripped, then a
/// trailing `_COORDS` if present
pub fn region_key(stem: &str) -> String {
    let key = stem.strip_suffix(POINT_OUTPUT_SUFFIX).unwrap_or(stem);
    let key = key.strip_suffix(COORDS_SUFFIX).unwrap_or(key);
    key.to_string()
}

/// Region name to sample table
#[derive(Debug, Clone, Default)]
pub struct RegionDictionary {
    tables: BTreeMap<String, DataFrame>,
}

impl RegionDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Region names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn get(&self, region: &str) -> Option<&DataFrame> {
        self.tables.get(region)
    }

    /// Insert a table, returning the one it replaced
    pub fn insert(&mut self, region: impl Into<String>, table: DataFrame) -> Option<DataFrame> {
        self.tables.insert(region.into(), table)
    }

    /// Write every table to one Parquet file with a `region` column. Each
    /// region's own column list and types travel in the file metadata.
    pub fn save(&self, path: &Path) -> Result<usize> {
        if self.tables.is_empty() {
            return Err(SnodasError::configuration(
                "Cannot save an empty region dictionary",
            ));
        }

        let mut schemas: BTreeMap<String, Vec<StoredColumn>> = BTreeMap::new();
        let mut frames = Vec::with_capacity(self.tables.len());
        for (region, table) in &self.tables {
            let mut columns = Vec::with_capacity(table.width());
            let mut stored = Vec::with_capacity(table.width());
            for column in table.get_columns() {
                let dtype = StoredType::of(column.dtype());
                stored.push(column.cast(&dtype.data_type())?);
                columns.push(StoredColumn {
                    name: column.name().to_string(),
                    dtype,
                });
            }
            schemas.insert(region.clone(), columns);

            let mut frame = DataFrame::new(stored)?;
            frame.with_column(Column::new(
                REGION_COLUMN.into(),
                vec![region.as_str(); table.height()],
            ))?;
            frames.push(frame.lazy());
        }

        let mut combined = concat_lf_diagonal(
            frames,
            UnionArgs {
                to_supertypes: true,
                ..Default::default()
            },
        )?
        .collect()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let metadata = KeyValueMetadata::from_static(vec![(
            REGION_SCHEMA_KEY.to_string(),
            serde_json::to_string(&schemas)?,
        )]);
        let mut file = File::create(path)?;
        ParquetWriter::new(&mut file)
            .with_key_value_metadata(Some(metadata))
            .finish(&mut combined)?;

        info!(
            "Saved {} regions ({} rows) to {}",
            self.tables.len(),
            combined.height(),
            path.display()
        );
        Ok(combined.height())
    }

    /// Restore a dictionary written by [`RegionDictionary::save`], giving
    /// every region back exactly its own columns and types
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = ParquetReader::new(File::open(path)?);
        let schema_json = reader
            .get_metadata()?
            .key_value_metadata()
            .as_ref()
            .and_then(|entries| entries.iter().find(|entry| entry.key == REGION_SCHEMA_KEY))
            .and_then(|entry| entry.value.clone())
            .ok_or_else(|| SnodasError::ProcessingFailed {
                path: path.to_path_buf(),
                reason: "no region schema in file metadata".to_string(),
            })?;
        let schemas: BTreeMap<String, Vec<StoredColumn>> = serde_json::from_str(&schema_json)?;
        let combined = reader.finish()?;

        let mut dictionary = Self::new();
        for (region, columns) in schemas {
            let rows = combined
                .clone()
                .lazy()
                .filter(col(REGION_COLUMN).eq(lit(region.as_str())))
                .collect()?;

            let restored = columns
                .iter()
                .map(|spec| restore_column(rows.column(&spec.name)?, spec.dtype))
                .collect::<Result<Vec<Column>>>()?;
            dictionary.insert(region, DataFrame::new(restored)?);
        }

        debug!(
            "Loaded {} regions from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }
}

/// Column types a region table is persisted with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredType {
    Boolean,
    Int64,
    Float64,
    String,
}

impl StoredType {
    /// Integers widen to Int64, floats to Float64, anything else is text
    fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => StoredType::Boolean,
            dtype if dtype.is_integer() => StoredType::Int64,
            dtype if dtype.is_float() => StoredType::Float64,
            _ => StoredType::String,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            StoredType::Boolean => DataType::Boolean,
            StoredType::Int64 => DataType::Int64,
            StoredType::Float64 => DataType::Float64,
            StoredType::String => DataType::String,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredColumn {
    name: String,
    dtype: StoredType,
}

/// Cast a column read back from the shared file to its region's own type
fn restore_column(column: &Column, dtype: StoredType) -> Result<Column> {
    let target = dtype.data_type();
    if column.dtype() == &target {
        return Ok(column.clone());
    }

    // Booleans shared a column with text in another region
    if dtype == StoredType::Boolean && column.dtype() == &DataType::String {
        let flags: Vec<Option<bool>> = column
            .str()?
            .into_iter()
            .map(|value| value.map(|text| text == "true"))
            .collect();
        return Ok(Column::new(column.name().clone(), flags));
    }

    Ok(column.strict_cast(&target)?)
}

/// Fold every per-region CSV in `folder` into a dictionary and save it to
/// `output_path`. Two files mapping to the same region key is an error.
pub fn combine_region_tables(folder: &Path, output_path: &Path) -> Result<RegionDictionary> {
    let mut sources: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut dictionary = RegionDictionary::new();

    for path in discover_csv_files(folder)? {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let key = region_key(&stem);

        if let Some(first) = sources.get(&key) {
            return Err(SnodasError::RegionCollision {
                key,
                first: first.clone(),
                second: path,
            });
        }

        let table = read_csv(&path)?;
        debug!("Region '{}': {} rows from {}", key, table.height(), path.display());
        dictionary.insert(key.clone(), table);
        sources.insert(key, path);
    }

    if dictionary.is_empty() {
        return Err(SnodasError::configuration(format!(
            "No region tables found in {}",
            folder.display()
        )));
    }

    dictionary.save(output_path)?;
    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_region_key() {
        assert_eq!(region_key("basinA_SNODAS_m"), "basinA");
        assert_eq!(region_key("basinA_COORDS_SNODAS_m"), "basinA");
        assert_eq!(region_key("basin_SNODAS_m_extra"), "basin_SNODAS_m_extra");
        assert_eq!(region_key("plain"), "plain");
    }

    #[test]
    fn test_combine_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("tables");
        fs::create_dir_all(&folder).unwrap();
        fs::write(
            folder.join("basinA_SNODAS_m.csv"),
            "site,Long,Lat,2024-01-01\nA1,-120.0,45.0,1.5\nA2,-119.0,44.0,2.5\n",
        )
        .unwrap();
        fs::write(
            folder.join("basinB_SNODAS_m.csv"),
            "site,Long,Lat,2024-01-01,2024-01-02\nB1,-110.0,40.0,0.5,0.75\n",
        )
        .unwrap();

        let output = temp_dir.path().join("regions.parquet");
        let dictionary = combine_region_tables(&folder, &output).unwrap();
        assert_eq!(dictionary.keys().collect::<Vec<_>>(), vec!["basinA", "basinB"]);
        assert!(output.exists());

        let loaded = RegionDictionary::load(&output).unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["basinA", "basinB"]);

        let basin_a = loaded.get("basinA").unwrap();
        assert_eq!(basin_a.height(), 2);
        assert_eq!(basin_a.width(), 4);
        assert!(basin_a.column("2024-01-02").is_err());

        let basin_b = loaded.get("basinB").unwrap();
        assert_eq!(basin_b.width(), 5);
        let late = basin_b.column("2024-01-02").unwrap().f64().unwrap().get(0);
        assert_eq!(late, Some(0.75));
    }

    #[test]
    fn test_load_restores_each_region_schema() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("tables");
        fs::create_dir_all(&folder).unwrap();
        fs::write(
            folder.join("basinA_SNODAS_m.csv"),
            "site,Long,Lat,note,2024-01-01\n101,-120,45,,0.5\n102,-119,44,,0.25\n",
        )
        .unwrap();
        fs::write(
            folder.join("basinB_SNODAS_m.csv"),
            "site,Long,Lat,note,2024-01-01\nB1,-110.5,40.5,x,0.75\n",
        )
        .unwrap();
        fs::write(
            folder.join("basinC_SNODAS_m.csv"),
            "site,Long,Lat,2024-01-01\n",
        )
        .unwrap();

        let output = temp_dir.path().join("regions.parquet");
        let saved = combine_region_tables(&folder, &output).unwrap();
        let loaded = RegionDictionary::load(&output).unwrap();
        assert_eq!(
            loaded.keys().collect::<Vec<_>>(),
            vec!["basinA", "basinB", "basinC"]
        );

        for region in ["basinA", "basinB", "basinC"] {
            let before = saved.get(region).unwrap();
            let after = loaded.get(region).unwrap();
            assert_eq!(after.get_column_names(), before.get_column_names());
            assert_eq!(after.height(), before.height());
        }

        let basin_a = loaded.get("basinA").unwrap();
        assert_eq!(basin_a.column("site").unwrap().dtype(), &DataType::Int64);
        assert_eq!(basin_a.column("Long").unwrap().dtype(), &DataType::Int64);
        assert_eq!(basin_a.column("note").unwrap().null_count(), 2);
        let sites: Vec<Option<i64>> = basin_a
            .column("site")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(sites, vec![Some(101), Some(102)]);

        let basin_b = loaded.get("basinB").unwrap();
        assert_eq!(basin_b.column("site").unwrap().dtype(), &DataType::String);
        assert_eq!(basin_b.column("Long").unwrap().dtype(), &DataType::Float64);

        assert_eq!(loaded.get("basinC").unwrap().height(), 0);
    }

    #[test]
    fn test_load_without_region_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.parquet");
        let mut frame = df!("site" => ["A1"], "region" => ["basinA"]).unwrap();
        ParquetWriter::new(File::create(&path).unwrap())
            .finish(&mut frame)
            .unwrap();

        let result = RegionDictionary::load(&path);
        assert!(matches!(result, Err(SnodasError::ProcessingFailed { .. })));
    }

    #[test]
    fn test_key_collision_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("basinA_SNODAS_m.csv"),
            "site,Long,Lat\nA1,-120,45\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("basinA_COORDS_SNODAS_m.csv"),
            "site,Long,Lat\nA1,-120,45\n",
        )
        .unwrap();

        let err =
            combine_region_tables(temp_dir.path(), &temp_dir.path().join("out.parquet"))
                .unwrap_err();
        match err {
            SnodasError::RegionCollision { key, .. } => assert_eq!(key, "basinA"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_save_empty_dictionary() {
        let temp_dir = TempDir::new().unwrap();
        let result = RegionDictionary::new().save(&temp_dir.path().join("x.parquet"));
        assert!(result.is_err());
    }
}
