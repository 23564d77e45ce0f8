//! HTTP request handlers.

pub mod datasets;
pub mod diagnostics;
pub mod geoserver;
pub mod health;
pub mod layers;
