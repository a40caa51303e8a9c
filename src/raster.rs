//! GeoTIFF raster access.
//!
//! Decodes single-band GeoTIFFs into an in-memory [`RasterGrid`] with its
//! affine geotransform and declared no-data value, and writes grids back out
//! as f32 GeoTIFFs (used for materialised clips). Cells stay in the file's
//! sample type and are widened to f64 only when read.

use crate::constants::GEOTRANSFORM_TOLERANCE;
use crate::error::{Result, SnodasError};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use tracing::debug;

const RASTER_TYPE_GEOKEY: u16 = 1025;
const PIXEL_IS_POINT: u16 = 2;

/// GeoKey directory declaring a geographic WGS84 model (EPSG:4326),
/// pixel-is-area raster space.
const WGS84_GEOKEYS: [u16; 16] = [
    1, 1, 0, 3, // header: version, revision, minor, key count
    1024, 0, 1, 2, // GTModelTypeGeoKey = Geographic
    1025, 0, 1, 1, // GTRasterTypeGeoKey = PixelIsArea
    2048, 0, 1, 4326, // GeographicTypeGeoKey = WGS84
];

/// North-up affine transform between map and grid coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Longitude of the upper-left corner of the upper-left cell
    pub origin_x: f64,
    /// Latitude of the upper-left corner of the upper-left cell
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Map (longitude, latitude) to fractional-floor (row, col). May be
    /// negative or beyond the grid; callers check bounds.
    pub fn index(&self, longitude: f64, latitude: f64) -> (i64, i64) {
        let col = ((longitude - self.origin_x) / self.pixel_width).floor() as i64;
        let row = ((latitude - self.origin_y) / self.pixel_height).floor() as i64;
        (row, col)
    }

    /// Longitude of the centre of column `col`
    pub fn cell_center_x(&self, col: usize) -> f64 {
        self.origin_x + (col as f64 + 0.5) * self.pixel_width
    }

    /// Latitude of the centre of row `row`
    pub fn cell_center_y(&self, row: usize) -> f64 {
        self.origin_y + (row as f64 + 0.5) * self.pixel_height
    }

    /// Transform of the sub-grid starting at (`row`, `col`)
    pub fn offset(&self, row: usize, col: usize) -> Self {
        Self {
            origin_x: self.origin_x + col as f64 * self.pixel_width,
            origin_y: self.origin_y + row as f64 * self.pixel_height,
            ..*self
        }
    }

    /// Whether two transforms describe the same grid lattice
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= GEOTRANSFORM_TOLERANCE * a.abs().max(1.0);
        close(self.origin_x, other.origin_x)
            && close(self.origin_y, other.origin_y)
            && close(self.pixel_width, other.pixel_width)
            && close(self.pixel_height, other.pixel_height)
    }
}

/// Row-major cell samples in the raster's native type
#[derive(Debug, Clone, PartialEq)]
pub enum CellValues {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! each_cell_type {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            CellValues::U8($v) => $body,
            CellValues::U16($v) => $body,
            CellValues::U32($v) => $body,
            CellValues::U64($v) => $body,
            CellValues::I8($v) => $body,
            CellValues::I16($v) => $body,
            CellValues::I32($v) => $body,
            CellValues::I64($v) => $body,
            CellValues::F32($v) => $body,
            CellValues::F64($v) => $body,
        }
    };
}

impl CellValues {
    pub fn len(&self) -> usize {
        each_cell_type!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index`, widened to f64
    pub fn get(&self, index: usize) -> Option<f64> {
        each_cell_type!(self, v => v.get(index).map(|&x| x as f64))
    }

    /// Every sample widened to f64, row-major
    pub fn iter(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        each_cell_type!(self, v => Box::new(v.iter().map(|&x| x as f64)))
    }

    fn from_decoded(decoded: DecodingResult, path: &Path) -> Result<Self> {
        Ok(match decoded {
            DecodingResult::U8(v) => CellValues::U8(v),
            DecodingResult::U16(v) => CellValues::U16(v),
            DecodingResult::U32(v) => CellValues::U32(v),
            DecodingResult::U64(v) => CellValues::U64(v),
            DecodingResult::I8(v) => CellValues::I8(v),
            DecodingResult::I16(v) => CellValues::I16(v),
            DecodingResult::I32(v) => CellValues::I32(v),
            DecodingResult::I64(v) => CellValues::I64(v),
            DecodingResult::F32(v) => CellValues::F32(v),
            DecodingResult::F64(v) => CellValues::F64(v),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(SnodasError::UnsupportedRaster {
                    path: path.to_path_buf(),
                    reason: "unsupported sample format".to_string(),
                });
            }
        })
    }
}

/// A single-band raster held in memory, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
    cells: CellValues,
}

impl RasterGrid {
    /// Build a grid from row-major values
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
        values: Vec<f64>,
    ) -> Result<Self> {
        Self::from_cells(width, height, transform, nodata, CellValues::F64(values))
    }

    /// Build a grid from row-major samples of any type
    pub fn from_cells(
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
        cells: CellValues,
    ) -> Result<Self> {
        if cells.len() != width * height {
            return Err(SnodasError::configuration(format!(
                "Raster of {}x{} cells needs {} values, got {}",
                width,
                height,
                width * height,
                cells.len()
            )));
        }

        Ok(Self {
            width,
            height,
            transform,
            nodata,
            cells,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &CellValues {
        &self.cells
    }


    /// Cell value at (`row`, `col`), `None` outside the grid
    pub fn get(&self, row: i64, col: i64) -> Option<f64> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col >= self.width {
            return None;
        }
        self.cells.get(row * self.width + col)
    }

    /// Cell value under a map coordinate, `None` outside the extent
    pub fn sample(&self, longitude: f64, latitude: f64) -> Option<f64> {
        let (row, col) = self.transform.index(longitude, latitude);
        self.get(row, col)
    }

    /// Whether `value` is masked (NaN or the declared no-data value)
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nodata| value == nodata)
    }
}

/// Decode a single-band GeoTIFF
pub fn read_geotiff(path: &Path) -> Result<RasterGrid> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let transform = read_transform(&mut decoder, path)?;

    let nodata = match decoder.find_tag(Tag::GdalNodata)? {
        Some(value) => {
            let text = value.into_string()?;
            let text = text.trim_matches(char::from(0)).trim();
            text.parse::<f64>().ok()
        }
        None => None,
    };

    let cells = CellValues::from_decoded(decoder.read_image()?, path)?;
    if cells.len() != width * height {
        return Err(SnodasError::UnsupportedRaster {
            path: path.to_path_buf(),
            reason: format!(
                "expected a single band of {} cells, decoded {} samples",
                width * height,
                cells.len()
            ),
        });
    }

    debug!(
        "Read raster {}: {}x{} cells, nodata={:?}",
        path.display(),
        width,
        height,
        nodata
    );

    RasterGrid::from_cells(width, height, transform, nodata, cells)
}

/// Read the geotransform from ModelPixelScale + ModelTiepoint, falling back
/// to ModelTransformation. Point-registered rasters are moved to their cell
/// corners.
fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform> {
    let transform = model_transform(decoder, path)?;

    if raster_type(decoder)? == Some(PIXEL_IS_POINT) {
        debug!("{} is PixelIsPoint; shifting origin by half a cell", path.display());
        return Ok(GeoTransform::new(
            transform.origin_x - transform.pixel_width / 2.0,
            transform.origin_y - transform.pixel_height / 2.0,
            transform.pixel_width,
            transform.pixel_height,
        ));
    }
    Ok(transform)
}

fn model_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform> {
    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        let scale = scale.into_f64_vec()?;
        let tiepoint = tiepoint.into_f64_vec()?;
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            let (sx, sy) = (scale[0], scale[1]);
            let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
            return Ok(GeoTransform::new(x - i * sx, y + j * sy, sx, -sy));
        }
    }

    if let Some(matrix) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = matrix.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(GeoTransform::new(m[3], m[7], m[0], m[5]));
        }
    }

    Err(SnodasError::UnsupportedRaster {
        path: path.to_path_buf(),
        reason: "missing georeferencing tags".to_string(),
    })
}

/// Value of GTRasterTypeGeoKey, if the GeoKey directory declares it
fn raster_type<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<u16>> {
    let Some(directory) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? else {
        return Ok(None);
    };
    let keys = directory.into_u16_vec()?;

    // Header is four shorts, then one (id, location, count, value) entry per key
    Ok(keys
        .get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .find(|entry| entry[0] == RASTER_TYPE_GEOKEY && entry[1] == 0)
        .map(|entry| entry[3]))
}

/// Write a grid as an f32 GeoTIFF with georeferencing and no-data tags
pub fn write_geotiff(path: &Path, grid: &RasterGrid) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image =
        encoder.new_image::<colortype::Gray32Float>(grid.width as u32, grid.height as u32)?;

    let t = &grid.transform;
    image.encoder().write_tag(
        Tag::ModelPixelScaleTag,
        &[t.pixel_width, -t.pixel_height, 0.0][..],
    )?;
    image.encoder().write_tag(
        Tag::ModelTiepointTag,
        &[0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0][..],
    )?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &WGS84_GEOKEYS[..])?;
    if let Some(nodata) = grid.nodata {
        let text = format!("{}", nodata);
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    let data: Vec<f32> = grid.cells.iter().map(|v| v as f32).collect();
    image.write_data(&data)?;

    debug!(
        "Wrote raster {}: {}x{} cells",
        path.display(),
        grid.width,
        grid.height
    );
    Ok(())
}
