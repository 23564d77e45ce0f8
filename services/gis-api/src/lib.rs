//! GIS Dashboard API Library
//!
//! HTTP service for the GIS dashboard: shapefile uploads into PostGIS,
//! editable tables, named layer queries and a GeoServer proxy, all behind
//! a session check against an external auth service.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
