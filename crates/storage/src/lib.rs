//! Storage for the GIS dashboard.
//!
//! Provides:
//! - Column type inference and dynamic DDL for uploaded shapefiles
//! - SQL builders for dynamically named tables
//! - `SpatialStore`, the PostgreSQL/PostGIS access layer

pub mod layers;
pub mod schema;
pub mod sql;
pub mod store;

pub use layers::{LayerFormat, LayerQuery};
pub use schema::{ColumnSpec, SqlColumnType, TableSchema};
pub use store::{IngestSummary, SpatialStore, UserLayer};
