//! Common types and utilities shared across the GIS dashboard services.

pub mod bbox;
pub mod error;
pub mod ident;

pub use bbox::{BboxParseError, BoundingBox};
pub use error::{GisError, GisResult};
pub use ident::{quote_ident, sanitize_column_name, validate_table_name};
