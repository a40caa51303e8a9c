//! SNODAS Processor Library
//!
//! Extracts snow water equivalent (SWE) time series from daily SNODAS
//! GeoTIFF rasters and assembles them into per-location tables.
//!
//! This library provides tools for:
//! - Selecting daily or weekly rasters by the date embedded in their names
//! - Sampling rasters at catalog point locations ([`sampler`])
//! - Clipping rasters to a polygon boundary and flattening the clipped grids
//!   into cell tables ([`polygon`])
//! - Preprocessing region catalogs and aggregating per-region outputs into a
//!   Parquet region dictionary
//!
//! Raw values are millimetres; outputs are metres, with the -9999 no-data
//! sentinel reported as NaN.

pub mod aggregate;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod filename;
pub mod geometry;
pub mod models;
pub mod polygon;
pub mod progress;
pub mod raster;
pub mod sampler;
pub mod selector;
pub mod table;

// Re-export commonly used types
pub use aggregate::{RegionDictionary, combine_region_tables};
pub use catalog::{Catalog, preprocess_catalogs};
pub use config::{OutOfExtentPolicy, SnodasConfig};
pub use error::{Result, SnodasError};
pub use models::{CoordinateRecord, DatedRaster, Frequency, ProcessingStats};
pub use polygon::{Clipper, GridFlattener, PolygonPipeline};
pub use raster::{GeoTransform, RasterGrid};
pub use sampler::{PointExtractor, PointSampler};
pub use selector::select_files;
pub use table::SampleTable;
