//! Pipeline tests for point extraction
//!
//! Rasters are synthesised as small GeoTIFFs so that every expected value
//! can be read off the fixture.
