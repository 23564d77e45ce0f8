//! Named layer handler.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde_json::Value;
use tracing::instrument;

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// GET /layer/:name - Run a configured layer query
///
/// Feature layers answer a JSON array of GeoJSON features; raw layers
/// answer their rows as plain objects.
#[instrument(skip(state))]
pub async fn layer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    metrics::record_request("layer");

    let layer = state
        .catalog
        .layers
        .find(&name)
        .ok_or_else(|| ApiError::not_found(format!("Unknown layer: {}", name)))?;

    Ok(Json(state.store.run_layer(layer).await?))
}
