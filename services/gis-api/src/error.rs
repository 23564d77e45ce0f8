//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use gis_common::GisError;

/// JSON body shape of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{ "error": message }`
    Plain,
    /// `{ "success": false, "error": message }`, used by `/datasets`.
    Dataset,
}

/// An error answered as JSON.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub envelope: Envelope,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            envelope: Envelope::Plain,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Answer with the `/datasets` envelope.
    pub fn dataset(mut self) -> Self {
        self.envelope = Envelope::Dataset;
        self
    }
}

impl From<GisError> for ApiError {
    fn from(err: GisError) -> Self {
        let status = StatusCode::from_u16(err.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if err.is_server_error() {
            error!(error = %err, "Request failed");
        } else {
            warn!(error = %err, "Request rejected");
        }

        Self::new(status, err.to_string())
    }
}

/// Map a storage error into the `/datasets` envelope.
pub fn dataset_error(err: GisError) -> ApiError {
    ApiError::from(err).dataset()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.envelope {
            Envelope::Plain => json!({ "error": self.message }),
            Envelope::Dataset => json!({ "success": false, "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
