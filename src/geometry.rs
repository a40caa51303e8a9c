//! Vector geometry input and output.
//!
//! Reads polygon boundaries from ESRI Shapefiles or GeoJSON into a
//! `geo::MultiPolygon`, and serialises point catalogs as GeoJSON
//! FeatureCollections.

use crate::error::{Result, SnodasError};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Read a polygon boundary from a `.shp` or `.geojson`/`.json` file
pub fn read_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    if !path.exists() {
        return Err(SnodasError::InvalidBoundary {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let boundary = match extension.as_str() {
        "shp" => read_shapefile_boundary(path)?,
        "geojson" | "json" => read_geojson_boundary(path)?,
        other => {
            return Err(SnodasError::InvalidBoundary {
                path: path.to_path_buf(),
                reason: format!("unsupported boundary format '{}'", other),
            });
        }
    };

    if boundary.0.is_empty() {
        return Err(SnodasError::InvalidBoundary {
            path: path.to_path_buf(),
            reason: "no polygons found".to_string(),
        });
    }

    info!(
        "Loaded boundary with {} polygon(s) from {}",
        boundary.0.len(),
        path.display()
    );
    Ok(boundary)
}

fn read_shapefile_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    let shapes = shapefile::read_shapes_as::<_, shapefile::Polygon>(path)?;
    let mut polygons = Vec::new();

    for shape in &shapes {
        // Each outer ring starts a polygon; inner rings belong to the
        // most recent outer ring.
        let mut current: Option<(LineString<f64>, Vec<LineString<f64>>)> = None;

        for ring in shape.rings() {
            let line: LineString<f64> = ring
                .points()
                .iter()
                .map(|p| Coord { x: p.x, y: p.y })
                .collect();

            match ring {
                shapefile::PolygonRing::Outer(_) => {
                    if let Some((exterior, interiors)) = current.take() {
                        polygons.push(Polygon::new(exterior, interiors));
                    }
                    current = Some((line, Vec::new()));
                }
                shapefile::PolygonRing::Inner(_) => match current.as_mut() {
                    Some((_, interiors)) => interiors.push(line),
                    None => {
                        return Err(SnodasError::InvalidBoundary {
                            path: path.to_path_buf(),
                            reason: "inner ring without an outer ring".to_string(),
                        });
                    }
                },
            }
        }

        if let Some((exterior, interiors)) = current {
            polygons.push(Polygon::new(exterior, interiors));
        }
    }

    debug!(
        "Read {} shapes ({} polygons) from {}",
        shapes.len(),
        polygons.len(),
        path.display()
    );
    Ok(MultiPolygon::new(polygons))
}

fn read_geojson_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let mut polygons = Vec::new();
    collect_geojson_polygons(&value, path, &mut polygons)?;
    Ok(MultiPolygon::new(polygons))
}

fn collect_geojson_polygons(value: &Value, path: &Path, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    let invalid = |reason: &str| SnodasError::InvalidBoundary {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("FeatureCollection without features"))?;
            for feature in features {
                collect_geojson_polygons(feature, path, out)?;
            }
        }
        Some("Feature") => {
            if let Some(geometry) = value.get("geometry").filter(|g| !g.is_null()) {
                collect_geojson_polygons(geometry, path, out)?;
            }
        }
        Some("GeometryCollection") => {
            let geometries = value
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("GeometryCollection without geometries"))?;
            for geometry in geometries {
                collect_geojson_polygons(geometry, path, out)?;
            }
        }
        Some("Polygon") => {
            let rings = value
                .get("coordinates")
                .ok_or_else(|| invalid("Polygon without coordinates"))?;
            out.push(parse_polygon_rings(rings).ok_or_else(|| invalid("malformed Polygon"))?);
        }
        Some("MultiPolygon") => {
            let polygons = value
                .get("coordinates")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("MultiPolygon without coordinates"))?;
            for rings in polygons {
                out.push(parse_polygon_rings(rings).ok_or_else(|| invalid("malformed MultiPolygon"))?);
            }
        }
        // Points and lines carry no area
        Some(_) => {}
        None => return Err(invalid("GeoJSON object without a type")),
    }

    Ok(())
}

fn parse_polygon_rings(rings: &Value) -> Option<Polygon<f64>> {
    let mut rings = rings.as_array()?.iter().map(parse_ring);
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

fn parse_ring(ring: &Value) -> Option<LineString<f64>> {
    ring.as_array()?
        .iter()
        .map(|position| {
            let position = position.as_array()?;
            Some(Coord {
                x: position.first()?.as_f64()?,
                y: position.get(1)?.as_f64()?,
            })
        })
        .collect::<Option<Vec<_>>>()
        .map(LineString::from)
}

/// A GeoJSON FeatureCollection of point features
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointFeatureCollection {
    #[serde(rename = "type")]
    pub type_: String,
    pub features: Vec<PointFeature>,
}

impl PointFeatureCollection {
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: PointFeature) -> Self {
        self.features.push(feature);
        self
    }

    /// Write the collection as pretty-printed GeoJSON
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }
}

impl Default for PointFeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// A GeoJSON point feature with free-form properties
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointFeature {
    #[serde(rename = "type")]
    pub type_: String,
    pub geometry: PointGeometry,
    pub properties: serde_json::Map<String, Value>,
}

impl PointFeature {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            type_: "Feature".to_string(),
            geometry: PointGeometry {
                type_: "Point".to_string(),
                coordinates: [longitude, latitude],
            },
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub type_: String,
    /// Coordinates as [longitude, latitude]
    pub coordinates: [f64; 2],
}

/// WKT text for a point, as written to the merged catalog CSV
pub fn point_wkt(longitude: f64, latitude: f64) -> String {
    format!("POINT ({} {})", longitude, latitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Contains;
    use tempfile::TempDir;

    const SQUARE_FEATURE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "basin"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "gauge"},
                "geometry": {"type": "Point", "coordinates": [5.0, 5.0]}
            }
        ]
    }"#;

    #[test]
    fn test_read_geojson_feature_collection() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aoi.geojson");
        std::fs::write(&path, SQUARE_FEATURE).unwrap();

        let boundary = read_boundary(&path).unwrap();
        assert_eq!(boundary.0.len(), 1);
        assert!(boundary.contains(&geo::point!(x: 1.0, y: 1.0)));
        assert!(!boundary.contains(&geo::point!(x: 3.0, y: 1.0)));
    }

    #[test]
    fn test_read_geojson_multipolygon_with_hole() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aoi.json");
        std::fs::write(
            &path,
            r#"{"type": "MultiPolygon", "coordinates": [
                [[[0,0],[10,0],[10,10],[0,10],[0,0]], [[4,4],[6,4],[6,6],[4,6],[4,4]]],
                [[[20,20],[21,20],[21,21],[20,21],[20,20]]]
            ]}"#,
        )
        .unwrap();

        let boundary = read_boundary(&path).unwrap();
        assert_eq!(boundary.0.len(), 2);
        assert!(boundary.contains(&geo::point!(x: 1.0, y: 1.0)));
        assert!(!boundary.contains(&geo::point!(x: 5.0, y: 5.0)));
        assert!(boundary.contains(&geo::point!(x: 20.5, y: 20.5)));
    }

    #[test]
    fn test_boundary_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = read_boundary(&temp_dir.path().join("missing.shp"));
        assert!(matches!(missing, Err(SnodasError::InvalidBoundary { .. })));

        let kml = temp_dir.path().join("aoi.kml");
        std::fs::write(&kml, "<kml/>").unwrap();
        assert!(matches!(
            read_boundary(&kml),
            Err(SnodasError::InvalidBoundary { .. })
        ));

        let points_only = temp_dir.path().join("points.geojson");
        std::fs::write(
            &points_only,
            r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#,
        )
        .unwrap();
        assert!(matches!(
            read_boundary(&points_only),
            Err(SnodasError::InvalidBoundary { .. })
        ));
    }

    #[test]
    fn test_point_feature_collection_serialization() {
        let collection = PointFeatureCollection::new().with_feature(
            PointFeature::point(-105.5, 40.25)
                .with_property("id", "site-1")
                .with_property("region", "basinA"),
        );

        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["geometry"]["coordinates"][0], -105.5);
        assert_eq!(json["features"][0]["properties"]["region"], "basinA");
    }

    #[test]
    fn test_point_wkt() {
        assert_eq!(point_wkt(-105.5, 40.25), "POINT (-105.5 40.25)");
    }
}
