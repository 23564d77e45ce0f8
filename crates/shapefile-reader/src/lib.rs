//! ESRI shapefile reader.
//!
//! Parses an uploaded `.shp` geometry file together with its `.dbf`
//! attribute table, both held in memory, into GeoJSON geometries paired
//! with typed attribute values. The `.shx` index and `.prj` projection are
//! not needed; coordinates are returned as stored (expected EPSG:4326).

pub mod attribute;
pub mod dbf;
pub mod shp;

use thiserror::Error;
use tracing::debug;

use geo_format::{Feature, Geometry};

pub use attribute::AttributeValue;
pub use dbf::{DbfField, DbfTable};
pub use encoding_rs::Encoding;
pub use shp::{ShapeType, ShpHeader};

#[derive(Debug, Error, PartialEq)]
pub enum ShapefileError {
    #[error("Invalid .shp file: {0}")]
    InvalidShp(String),

    #[error("Invalid .dbf file: {0}")]
    InvalidDbf(String),

    #[error("Unsupported shape type: {0}")]
    UnsupportedShapeType(i32),

    #[error("Truncated {file} data at offset {offset}")]
    Truncated { file: &'static str, offset: usize },

    #[error(".shp has {shapes} records but .dbf has {records}")]
    RecordCountMismatch { shapes: usize, records: usize },
}

/// One shape record joined with its attribute row.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFeature {
    pub geometry: Option<Geometry>,
    /// Attribute values in `.dbf` field order.
    pub attributes: Vec<(String, AttributeValue)>,
}

impl ShapeFeature {
    /// Look up an attribute by field name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Convert into a GeoJSON feature.
    pub fn to_feature(&self) -> Feature {
        let properties = self
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Feature::new(self.geometry.clone()).with_properties(properties)
    }
}

/// A fully read shapefile.
#[derive(Debug, Clone)]
pub struct Shapefile {
    pub shape_type: ShapeType,
    pub fields: Vec<DbfField>,
    pub features: Vec<ShapeFeature>,
}

/// Read a shapefile from its `.shp` and `.dbf` contents.
///
/// Shape record *n* is paired with attribute record *n*; records flagged
/// as deleted in the `.dbf` are dropped together with their shape.
/// Attribute text is decoded as windows-1252.
pub fn read_shapefile(shp: &[u8], dbf: &[u8]) -> Result<Shapefile, ShapefileError> {
    read_shapefile_with_encoding(shp, dbf, encoding_rs::WINDOWS_1252)
}

/// Like [`read_shapefile`], decoding `.dbf` text with `encoding`
/// (for example the label found in a `.cpg` file).
pub fn read_shapefile_with_encoding(
    shp: &[u8],
    dbf: &[u8],
    encoding: &'static Encoding,
) -> Result<Shapefile, ShapefileError> {
    let header = shp::parse_header(shp)?;
    let shapes = shp::parse_records(shp, &header)?;
    let table = dbf::parse_dbf_with_encoding(dbf, encoding)?;

    if shapes.len() != table.records.len() {
        return Err(ShapefileError::RecordCountMismatch {
            shapes: shapes.len(),
            records: table.records.len(),
        });
    }

    let features: Vec<ShapeFeature> = shapes
        .into_iter()
        .zip(table.records)
        .filter(|(_, record)| !record.deleted)
        .map(|(geometry, record)| ShapeFeature {
            geometry,
            attributes: table
                .fields
                .iter()
                .map(|f| f.name.clone())
                .zip(record.values)
                .collect(),
        })
        .collect();

    debug!(
        shape_type = ?header.shape_type,
        fields = table.fields.len(),
        features = features.len(),
        "Read shapefile"
    );

    Ok(Shapefile {
        shape_type: header.shape_type,
        fields: table.fields,
        features,
    })
}
