//! Geometry interchange formats.
//!
//! This crate provides:
//! - GeoJSON `Geometry`, `Feature` and `FeatureCollection` types
//! - A WKT reader and writer for the same geometry model
//! - Ring orientation helpers used before geometries are stored as geography
//!
//! Positions are always `[longitude, latitude]`. Z and M ordinates are
//! accepted on input and dropped.

pub mod geojson;
pub mod orientation;
pub mod wkt;

pub use geojson::{Feature, FeatureCollection, Geometry, Position, Ring};
pub use orientation::{orient_polygon, ring_contains, ring_signed_area};
pub use wkt::{parse_wkt, to_wkt, WktError};
