//! Error types for the GIS dashboard services.

use thiserror::Error;

/// Result type alias using GisError.
pub type GisResult<T> = Result<T, GisError>;

/// Primary error type for dataset, layer and proxy operations.
#[derive(Debug, Error)]
pub enum GisError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("{0}")]
    BadRequest(String),

    // === Lookup Errors ===
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Table \"{0}\" already exists.")]
    TableExists(String),

    // === Data Errors ===
    #[error("Invalid shapefile: {0}")]
    ShapefileError(String),

    // === Infrastructure Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl GisError {
    /// Shorthand for an invalid parameter error.
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        GisError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            GisError::MissingParameter(_)
            | GisError::InvalidParameter { .. }
            | GisError::BadRequest(_)
            | GisError::ShapefileError(_) => 400,

            GisError::LayerNotFound(_) | GisError::NotFound(_) => 404,

            GisError::TableExists(_) => 409,

            GisError::UpstreamError(_) => 502,

            _ => 500,
        }
    }

    /// Whether this error reflects a server-side failure worth logging at error level.
    pub fn is_server_error(&self) -> bool {
        self.http_status_code() >= 500
    }
}

impl From<serde_json::Error> for GisError {
    fn from(err: serde_json::Error) -> Self {
        GisError::InternalError(format!("JSON error: {}", err))
    }
}
