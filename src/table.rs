//! Sample tables: catalog rows plus one value column per date.
//!
//! Wraps a polars `DataFrame` so that date columns can only grow through
//! checked appends, and provides the CSV helpers every pipeline uses.

use crate::config::SnodasConfig;
use crate::error::{Result, SnodasError};
use crate::models::date_column_name;
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

/// A table whose rows are fixed at construction and whose columns grow one
/// date at a time
#[derive(Debug, Clone)]
pub struct SampleTable {
    frame: DataFrame,
    dates: Vec<NaiveDate>,
}

impl SampleTable {
    /// Start a table from the catalog or grid columns that identify its rows
    pub fn new(frame: DataFrame) -> Self {
        Self {
            frame,
            dates: Vec::new(),
        }
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Dates appended so far, in append order
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Append a column of already-converted values
    pub fn append_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.height() {
            return Err(SnodasError::ColumnLength {
                column: name.to_string(),
                expected: self.height(),
                found: values.len(),
            });
        }

        if self
            .frame
            .get_column_names()
            .iter()
            .any(|existing| existing.as_str() == name)
        {
            return Err(SnodasError::DuplicateDate {
                column: name.to_string(),
            });
        }

        self.frame.with_column(Column::new(name.into(), values))?;
        debug!("Appended column '{}' ({} rows)", name, self.height());
        Ok(())
    }

    /// Append the column for `date`, named `YYYY-MM-DD`
    pub fn append_date(&mut self, date: NaiveDate, values: Vec<f64>) -> Result<()> {
        self.append_column(&date_column_name(date), values)?;
        self.dates.push(date);
        Ok(())
    }

    /// Values of a column as f64, NaN for nulls
    pub fn column_values(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.frame.column(name)?.cast(&DataType::Float64)?;
        Ok(column
            .f64()?
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect())
    }

    /// Write the table as CSV
    pub fn write_csv(&mut self, path: &Path) -> Result<()> {
        write_csv(&mut self.frame, path)
    }
}

/// Convert raw raster values to metres, mapping the sentinel to NaN
pub fn convert_values(raw: &[f64], config: &SnodasConfig) -> Vec<f64> {
    raw.iter().map(|&value| config.convert(value)).collect()
}

/// Read a CSV file with a header row
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Write a DataFrame as CSV, creating parent directories
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;

    debug!(
        "Wrote {} rows x {} columns to {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(())
}
