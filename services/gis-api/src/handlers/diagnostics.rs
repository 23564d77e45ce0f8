//! Diagnostics handler.

use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde_json::Value;
use tracing::instrument;

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// GET /test/getTest - Raw rows of the diagnostics table
#[instrument(skip(state))]
pub async fn get_test_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    metrics::record_request("test");

    let rows = state
        .store
        .layer_rows(&state.catalog.layers.diagnostics)
        .await?;
    Ok(Json(Value::Array(rows)))
}
