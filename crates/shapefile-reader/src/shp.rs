//! `.shp` geometry file parsing.
//!
//! File header (100 bytes):
//! - bytes 0-3: file code 9994 (big-endian)
//! - bytes 24-27: file length in 16-bit words (big-endian)
//! - bytes 28-31: version 1000 (little-endian)
//! - bytes 32-35: shape type (little-endian)
//! - bytes 36-99: bounding box (eight little-endian doubles)
//!
//! Each record is an 8-byte big-endian header (record number, content
//! length in words) followed by little-endian content starting with the
//! record's shape type.

use geo_format::{ring_contains, ring_signed_area, Geometry, Position, Ring};

use crate::ShapefileError;

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;
const HEADER_LEN: usize = 100;

/// Base shape families. Z and M variants map onto their XY family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Result<Self, ShapefileError> {
        match code {
            0 => Ok(ShapeType::Null),
            1 | 11 | 21 => Ok(ShapeType::Point),
            3 | 13 | 23 => Ok(ShapeType::PolyLine),
            5 | 15 | 25 => Ok(ShapeType::Polygon),
            8 | 18 | 28 => Ok(ShapeType::MultiPoint),
            other => Err(ShapefileError::UnsupportedShapeType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShpHeader {
    pub shape_type: ShapeType,
    /// File length in bytes as declared by the header.
    pub file_length: usize,
    /// `[min_x, min_y, max_x, max_y]`
    pub bbox: [f64; 4],
}

fn be_i32(data: &[u8], offset: usize) -> Result<i32, ShapefileError> {
    data.get(offset..offset + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ShapefileError::Truncated {
            file: "shp",
            offset,
        })
}

fn le_i32(data: &[u8], offset: usize) -> Result<i32, ShapefileError> {
    data.get(offset..offset + 4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ShapefileError::Truncated {
            file: "shp",
            offset,
        })
}

fn le_f64(data: &[u8], offset: usize) -> Result<f64, ShapefileError> {
    data.get(offset..offset + 8)
        .map(|b| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(b);
            f64::from_le_bytes(buf)
        })
        .ok_or(ShapefileError::Truncated {
            file: "shp",
            offset,
        })
}

fn le_count(data: &[u8], offset: usize) -> Result<usize, ShapefileError> {
    let value = le_i32(data, offset)?;
    usize::try_from(value)
        .map_err(|_| ShapefileError::InvalidShp(format!("Negative count at offset {}", offset)))
}

/// Parse the 100-byte main file header.
pub fn parse_header(data: &[u8]) -> Result<ShpHeader, ShapefileError> {
    if data.len() < HEADER_LEN {
        return Err(ShapefileError::InvalidShp(
            "Not enough data for header".to_string(),
        ));
    }

    let file_code = be_i32(data, 0)?;
    if file_code != FILE_CODE {
        return Err(ShapefileError::InvalidShp(format!(
            "Invalid file code {}",
            file_code
        )));
    }

    let version = le_i32(data, 28)?;
    if version != VERSION {
        return Err(ShapefileError::InvalidShp(format!(
            "Unsupported version {}",
            version
        )));
    }

    let file_length = be_i32(data, 24)?.max(0) as usize * 2;
    let shape_type = ShapeType::from_code(le_i32(data, 32)?)?;

    Ok(ShpHeader {
        shape_type,
        file_length,
        bbox: [
            le_f64(data, 36)?,
            le_f64(data, 44)?,
            le_f64(data, 52)?,
            le_f64(data, 60)?,
        ],
    })
}

/// Parse every record after the header. Null shapes yield `None`.
pub fn parse_records(
    data: &[u8],
    header: &ShpHeader,
) -> Result<Vec<Option<Geometry>>, ShapefileError> {
    // Some writers leave the declared length stale; trust the smaller bound.
    let end = if header.file_length >= HEADER_LEN {
        header.file_length.min(data.len())
    } else {
        data.len()
    };

    let mut shapes = Vec::new();
    let mut offset = HEADER_LEN;
    while offset + 8 <= end {
        let content_len = be_i32(data, offset + 4)?.max(0) as usize * 2;
        let start = offset + 8;
        let content = data
            .get(start..start + content_len)
            .ok_or(ShapefileError::Truncated {
                file: "shp",
                offset: start,
            })?;
        shapes.push(parse_shape(content)?);
        offset = start + content_len;
    }

    Ok(shapes)
}

/// Parse one record's content.
pub fn parse_shape(content: &[u8]) -> Result<Option<Geometry>, ShapefileError> {
    let shape_type = ShapeType::from_code(le_i32(content, 0)?)?;

    match shape_type {
        ShapeType::Null => Ok(None),
        ShapeType::Point => {
            let x = le_f64(content, 4)?;
            let y = le_f64(content, 12)?;
            Ok(Some(Geometry::point(x, y)))
        }
        ShapeType::MultiPoint => {
            // shape type (4) + bbox (32)
            let num_points = le_count(content, 36)?;
            let points = read_points(content, 40, num_points)?;
            Ok(Some(Geometry::MultiPoint {
                coordinates: points,
            }))
        }
        ShapeType::PolyLine | ShapeType::Polygon => {
            let parts = read_parts(content)?;
            if parts.is_empty() {
                return Ok(None);
            }
            if shape_type == ShapeType::PolyLine {
                Ok(Some(if parts.len() == 1 {
                    Geometry::line_string(parts.into_iter().flatten().collect())
                } else {
                    Geometry::MultiLineString { coordinates: parts }
                }))
            } else {
                Ok(assemble_polygon(parts))
            }
        }
    }
}

fn read_points(
    content: &[u8],
    offset: usize,
    count: usize,
) -> Result<Vec<Position>, ShapefileError> {
    let needed = count.checked_mul(16).and_then(|n| n.checked_add(offset));
    if needed.map_or(true, |n| content.len() < n) {
        return Err(ShapefileError::Truncated {
            file: "shp",
            offset: content.len(),
        });
    }
    (0..count)
        .map(|i| {
            let at = offset + i * 16;
            Ok([le_f64(content, at)?, le_f64(content, at + 8)?])
        })
        .collect()
}

/// Split a PolyLine/Polygon record into its parts.
fn read_parts(content: &[u8]) -> Result<Vec<Vec<Position>>, ShapefileError> {
    let num_parts = le_count(content, 36)?;
    let num_points = le_count(content, 40)?;
    if num_parts > content.len() / 4 {
        return Err(ShapefileError::Truncated {
            file: "shp",
            offset: content.len(),
        });
    }

    let mut starts = Vec::with_capacity(num_parts);
    for i in 0..num_parts {
        starts.push(le_count(content, 44 + i * 4)?);
    }
    let points = read_points(content, 44 + num_parts * 4, num_points)?;

    let mut parts = Vec::with_capacity(num_parts);
    for (i, &start) in starts.iter().enumerate() {
        let stop = starts.get(i + 1).copied().unwrap_or(num_points);
        if start > stop || stop > num_points {
            return Err(ShapefileError::InvalidShp(format!(
                "Part {} spans invalid point range {}..{}",
                i, start, stop
            )));
        }
        parts.push(points[start..stop].to_vec());
    }
    Ok(parts)
}

/// Group shapefile rings into polygons.
///
/// Clockwise rings are exteriors and counter-clockwise rings are holes.
/// Each hole joins the first exterior that contains its first vertex; a hole
/// no exterior contains becomes a polygon of its own.
pub fn assemble_polygon(rings: Vec<Ring>) -> Option<Geometry> {
    let mut polygons: Vec<Vec<Ring>> = Vec::new();
    let mut holes: Vec<Ring> = Vec::new();

    for ring in rings.into_iter().filter(|r| !r.is_empty()) {
        if ring_signed_area(&ring) <= 0.0 {
            polygons.push(vec![ring]);
        } else {
            holes.push(ring);
        }
    }

    for hole in holes {
        let first = hole[0];
        match polygons.iter_mut().find(|p| ring_contains(&p[0], first)) {
            Some(polygon) => polygon.push(hole),
            None => polygons.push(vec![hole]),
        }
    }

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::polygon),
        _ => Some(Geometry::MultiPolygon {
            coordinates: polygons,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_type_codes() {
        assert_eq!(ShapeType::from_code(15).unwrap(), ShapeType::Polygon);
        assert_eq!(ShapeType::from_code(28).unwrap(), ShapeType::MultiPoint);
        assert_eq!(
            ShapeType::from_code(31),
            Err(ShapefileError::UnsupportedShapeType(31))
        );
    }

    #[test]
    fn test_bad_file_code() {
        let mut data = vec![0u8; 100];
        data[3] = 1;
        assert!(matches!(
            parse_header(&data),
            Err(ShapefileError::InvalidShp(_))
        ));
    }

    #[test]
    fn test_assemble_single_exterior() {
        let cw = vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let geom = assemble_polygon(vec![cw.clone()]).unwrap();
        assert_eq!(geom, Geometry::polygon(vec![cw]));
    }

    #[test]
    fn test_assemble_orphan_hole_becomes_polygon() {
        let cw = vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let far_ccw = vec![[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 5.0]];
        match assemble_polygon(vec![cw, far_ccw]).unwrap() {
            Geometry::MultiPolygon { coordinates } => assert_eq!(coordinates.len(), 2),
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_empty() {
        assert_eq!(assemble_polygon(vec![]), None);
    }
}
