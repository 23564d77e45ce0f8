//! GeoJSON types (RFC 7946) used for layer responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::orientation::orient_polygon;

/// A `[longitude, latitude]` pair.
pub type Position = [f64; 2];

/// A closed linear ring.
pub type Ring = Vec<Position>;

/// GeoJSON geometry types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A single position.
    Point { coordinates: Position },

    /// An unordered set of positions.
    MultiPoint { coordinates: Vec<Position> },

    /// A connected sequence of positions.
    LineString { coordinates: Vec<Position> },

    /// Several line strings.
    MultiLineString { coordinates: Vec<Vec<Position>> },

    /// Linear rings; the first is the exterior, the rest are holes.
    Polygon { coordinates: Vec<Ring> },

    /// Several polygons.
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

impl Geometry {
    /// Create a point geometry.
    pub fn point(lon: f64, lat: f64) -> Self {
        Geometry::Point {
            coordinates: [lon, lat],
        }
    }

    /// Create a line string geometry.
    pub fn line_string(coordinates: Vec<Position>) -> Self {
        Geometry::LineString { coordinates }
    }

    /// Create a polygon geometry.
    pub fn polygon(coordinates: Vec<Ring>) -> Self {
        Geometry::Polygon { coordinates }
    }

    /// GeoJSON type name of this geometry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }

    /// Return a copy with polygon rings oriented exterior counter-clockwise
    /// and holes clockwise. Non-polygonal geometries are returned unchanged.
    pub fn normalized(&self) -> Self {
        match self {
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: orient_polygon(coordinates),
            },
            Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
                coordinates: coordinates.iter().map(|p| orient_polygon(p)).collect(),
            },
            other => other.clone(),
        }
    }
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    /// Optional feature identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Geometry, serialized as `null` when absent.
    pub geometry: Option<Geometry>,

    /// Attribute values.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Create a feature with the given geometry and no properties.
    pub fn new(geometry: Option<Geometry>) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: None,
            geometry,
            properties: Map::new(),
        }
    }

    /// Set the feature ID.
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the properties.
    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Add a single property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    /// Array of features.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a new empty FeatureCollection.
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    /// Add multiple features to the collection.
    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features.extend(features);
        self
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_serialization() {
        let geom = Geometry::point(121.0, 14.5);
        let value = serde_json::to_value(&geom).unwrap();
        assert_eq!(value, json!({"type": "Point", "coordinates": [121.0, 14.5]}));
    }

    #[test]
    fn test_feature_with_null_geometry() {
        let feature = Feature::new(None).with_id(7).with_property("name", "Abra");
        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(value["type"], "Feature");
        assert_eq!(value["id"], 7);
        assert!(value["geometry"].is_null());
        assert_eq!(value["properties"]["name"], "Abra");
    }

    #[test]
    fn test_feature_without_id_omits_member() {
        let feature = Feature::new(Some(Geometry::point(0.0, 0.0)));
        let value = serde_json::to_value(&feature).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_polygon_deserialization() {
        let geom: Geometry = serde_json::from_value(json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
        }))
        .unwrap();
        assert_eq!(geom.type_name(), "Polygon");
    }

    #[test]
    fn test_properties_keep_insertion_order() {
        let feature = Feature::new(None)
            .with_property("objectID", 1)
            .with_property("name", "Agno")
            .with_property("area", 5.5);
        let text = serde_json::to_string(&feature.properties).unwrap();
        assert_eq!(text, r#"{"objectID":1,"name":"Agno","area":5.5}"#);
    }
}
