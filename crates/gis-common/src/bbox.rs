//! Bounding box parsing for proxied WMS requests.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box.
///
/// For EPSG:4326 coordinates are in degrees, for EPSG:3857 in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse a WMS BBOX parameter string: "minx,miny,maxx,maxy"
    pub fn from_wms_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            let value: f64 = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
            if !value.is_finite() {
                return Err(BboxParseError::InvalidNumber(part.to_string()));
            }
            *slot = value;
        }

        let bbox = Self::new(values[0], values[1], values[2], values[3]);
        if bbox.min_x >= bbox.max_x || bbox.min_y >= bbox.max_y {
            return Err(BboxParseError::Inverted(s.to_string()));
        }
        Ok(bbox)
    }

    /// Format as a WMS BBOX parameter.
    pub fn to_wms_string(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("Invalid BBOX: {0}. Minimum must be less than maximum")]
    Inverted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wms_bbox() {
        let bbox = BoundingBox::from_wms_string("-125.0,24.0,-66.0,50.0").unwrap();
        assert_eq!(bbox.min_x, -125.0);
        assert_eq!(bbox.min_y, 24.0);
        assert_eq!(bbox.max_x, -66.0);
        assert_eq!(bbox.max_y, 50.0);
    }

    #[test]
    fn test_round_trip_wms_string() {
        let bbox = BoundingBox::new(13358338.9, 1878516.4, 13397474.7, 1917652.2);
        let parsed = BoundingBox::from_wms_string(&bbox.to_wms_string()).unwrap();
        assert_eq!(bbox, parsed);
    }
}
