//! Shared test utilities for the GIS dashboard workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Builders that synthesize `.shp` and `.dbf` byte buffers
//! - Common test fixtures (coordinates, layer names)
//! - Approximate float assertions
//! - Skipping tests that need a database
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{DbfBuilder, ShpBuilder};
//! ```

pub mod fixtures;
pub mod shapefile;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use shapefile::{DbfBuilder, ShpBuilder};

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Read an environment variable or skip the current test.
///
/// Database-backed tests use this so they only run where a PostGIS
/// instance is provided.
///
/// ```ignore
/// #[tokio::test]
/// async fn test_against_database() {
///     let url = test_utils::require_env!("TEST_DATABASE_URL");
///     // ... test code
/// }
/// ```
#[macro_export]
macro_rules! require_env {
    ($name:expr) => {{
        match std::env::var($name) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                eprintln!("SKIPPED: environment variable '{}' is not set", $name);
                return;
            }
        }
    }};
}
