//! `/datasets` handlers: shapefile upload, uploaded-layer registry and
//! editable tables.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Extension, Multipart, Path},
    Json,
};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use geo_format::FeatureCollection;
use gis_common::GisError;
use shapefile_reader::{read_shapefile, Shapefile};
use storage::UserLayer;

use crate::error::{dataset_error, ApiError};
use crate::metrics;
use crate::state::AppState;

/// Fields collected from the upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub shp: Option<Bytes>,
    pub dbf: Option<Bytes>,
    pub table_name: Option<String>,
    pub group_name: Option<String>,
}

/// A validated upload, ready for parsing.
#[derive(Debug)]
pub struct ShapefileUpload {
    pub shp: Bytes,
    pub dbf: Bytes,
    pub table_name: String,
    pub group_name: String,
}

impl UploadForm {
    /// Check that both files and both names were sent.
    pub fn validate(self) -> Result<ShapefileUpload, GisError> {
        let (shp, dbf) = match (self.shp, self.dbf) {
            (None, None) => {
                return Err(GisError::BadRequest("No files were uploaded.".to_string()))
            }
            (Some(shp), Some(dbf)) => (shp, dbf),
            _ => {
                return Err(GisError::BadRequest(
                    "Both .shp and .dbf files are required.".to_string(),
                ))
            }
        };

        let table_name = self
            .table_name
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        gis_common::validate_table_name(&table_name)?;

        let group_name = self
            .group_name
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .ok_or_else(|| GisError::MissingParameter("groupName".to_string()))?;

        Ok(ShapefileUpload {
            shp,
            dbf,
            table_name,
            group_name,
        })
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), format!("Invalid upload: {}", err.body_text())).dataset()
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "shp" => form.shp = Some(field.bytes().await.map_err(multipart_error)?),
            "dbf" => form.dbf = Some(field.bytes().await.map_err(multipart_error)?),
            "tableName" => form.table_name = Some(field.text().await.map_err(multipart_error)?),
            "groupName" => form.group_name = Some(field.text().await.map_err(multipart_error)?),
            other => debug!(field = %other, "Ignoring upload field"),
        }
    }

    Ok(form)
}

async fn parse_upload(shp: Bytes, dbf: Bytes) -> Result<Shapefile, GisError> {
    tokio::task::spawn_blocking(move || read_shapefile(&shp, &dbf))
        .await
        .map_err(|e| GisError::InternalError(format!("Shapefile parser task failed: {}", e)))?
        .map_err(|e| GisError::ShapefileError(e.to_string()))
}

/// POST /datasets/shapefiles - Create a table from an uploaded shapefile
#[instrument(skip(state, multipart))]
pub async fn upload_shapefile_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    metrics::record_request("datasets_upload");

    let upload = read_form(multipart).await?.validate().map_err(dataset_error)?;
    info!(
        table = %upload.table_name,
        group = %upload.group_name,
        shp_bytes = upload.shp.len(),
        dbf_bytes = upload.dbf.len(),
        "Received shapefile upload"
    );

    let shapefile = parse_upload(upload.shp, upload.dbf)
        .await
        .map_err(dataset_error)?;

    let summary = state
        .store
        .ingest_shapefile(&upload.table_name, &upload.group_name, &shapefile)
        .await
        .map_err(dataset_error)?;
    metrics::record_ingested_features(summary.features_count);

    Ok(Json(json!({
        "success": true,
        "tableName": summary.table_name,
        "columns": summary.columns,
        "featuresCount": summary.features_count,
    })))
}

/// GET /datasets/uploaded-layers - Registered layers, newest first
#[instrument(skip(state))]
pub async fn uploaded_layers_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<UserLayer>>, ApiError> {
    metrics::record_request("datasets_uploaded_layers");
    Ok(Json(state.store.list_uploaded_layers().await?))
}

/// GET /datasets/uploaded-layer/:layerId - One uploaded layer as GeoJSON
#[instrument(skip(state))]
pub async fn uploaded_layer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(layer_id): Path<String>,
) -> Result<Json<FeatureCollection>, ApiError> {
    metrics::record_request("datasets_uploaded_layer");

    match state.store.uploaded_layer_geojson(&layer_id).await {
        Ok(collection) => Ok(Json(collection)),
        Err(GisError::LayerNotFound(_)) => Err(ApiError::not_found("Layer not found")),
        Err(e) => Err(e.into()),
    }
}

/// GET /datasets/editables/tables - Static and uploaded editable tables
#[instrument(skip(state))]
pub async fn editable_tables_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    metrics::record_request("datasets_editable_tables");

    let tables = state
        .store
        .editable_tables(&state.catalog.layers.editable_tables)
        .await
        .map_err(dataset_error)?;

    Ok(Json(json!({ "success": true, "tables": tables })))
}

/// GET /datasets/editables/:tableName - Rows of an editable table
#[instrument(skip(state))]
pub async fn editable_rows_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    metrics::record_request("datasets_editable_rows");

    state
        .store
        .ensure_editable(&state.catalog.layers.editable_tables, &table_name)
        .await
        .map_err(dataset_error)?;
    let rows = state
        .store
        .editable_rows(&table_name)
        .await
        .map_err(dataset_error)?;

    Ok(Json(json!({ "success": true, "data": rows })))
}

fn parse_row_id(id: &str) -> Result<i64, ApiError> {
    id.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid row id: {}", id)).dataset())
}

/// PUT /datasets/editables/:tableName/:id - Update one row
#[instrument(skip(state, payload))]
pub async fn update_row_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((table_name, id)): Path<(String, String)>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    metrics::record_request("datasets_update_row");

    let id = parse_row_id(&id)?;
    let Json(updates) =
        payload.map_err(|e| ApiError::bad_request(e.body_text()).dataset())?;

    state
        .store
        .ensure_editable(&state.catalog.layers.editable_tables, &table_name)
        .await
        .map_err(dataset_error)?;
    state
        .store
        .update_row(&table_name, id, &updates)
        .await
        .map_err(dataset_error)?;

    Ok(Json(json!({ "success": true, "message": "Row updated successfully." })))
}

/// DELETE /datasets/editables/:tableName/:id - Delete one row
#[instrument(skip(state))]
pub async fn delete_row_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((table_name, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    metrics::record_request("datasets_delete_row");

    let id = parse_row_id(&id)?;
    state
        .store
        .ensure_editable(&state.catalog.layers.editable_tables, &table_name)
        .await
        .map_err(dataset_error)?;
    state
        .store
        .delete_row(&table_name, id)
        .await
        .map_err(dataset_error)?;

    Ok(Json(json!({ "success": true })))
}
