//! GeoServer proxy handlers.
//!
//! Requests are forwarded with the service's own GeoServer credentials so
//! the browser never sees them.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, instrument};

use gis_common::{BoundingBox, GisError, GisResult};

use crate::config::GeoServerSettings;
use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

const DEFAULT_TILE_SIZE: u32 = 256;
const MAX_TILE_SIZE: u32 = 4096;
const DEFAULT_SRS: &str = "EPSG:3857";

/// Query parameters of the WMS tile proxy.
#[derive(Debug, Default, Deserialize)]
pub struct WmsTileParams {
    pub layer: Option<String>,
    pub bbox: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub srs: Option<String>,
}

/// A validated GetMap request.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest {
    pub layer: String,
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
    pub srs: String,
}

fn parse_size(param: &str, value: Option<&str>) -> GisResult<u32> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_TILE_SIZE),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if (1..=MAX_TILE_SIZE).contains(&n) => Ok(n),
            _ => Err(GisError::invalid(
                param,
                format!("must be an integer between 1 and {}", MAX_TILE_SIZE),
            )),
        },
    }
}

impl WmsTileParams {
    pub fn validate(&self) -> GisResult<GetMapRequest> {
        let layer = self
            .layer
            .as_deref()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| GisError::MissingParameter("layer".to_string()))?;
        let bbox = self
            .bbox
            .as_deref()
            .ok_or_else(|| GisError::MissingParameter("bbox".to_string()))?;
        let bbox = BoundingBox::from_wms_string(bbox)
            .map_err(|e| GisError::invalid("bbox", e.to_string()))?;

        Ok(GetMapRequest {
            layer: layer.to_string(),
            bbox,
            width: parse_size("width", self.width.as_deref())?,
            height: parse_size("height", self.height.as_deref())?,
            srs: self
                .srs
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SRS.to_string()),
        })
    }
}

impl GetMapRequest {
    /// WMS 1.1.1 GetMap query string parameters.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("service", "WMS".to_string()),
            ("version", "1.1.1".to_string()),
            ("request", "GetMap".to_string()),
            ("layers", self.layer.clone()),
            ("styles", String::new()),
            ("bbox", self.bbox.to_wms_string()),
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
            ("srs", self.srs.clone()),
            ("format", "image/png".to_string()),
            ("transparent", "true".to_string()),
        ]
    }
}

/// WFS 1.0.0 GetFeature query string parameters.
pub fn wfs_query_params(type_name: &str, max_features: u32) -> Vec<(&'static str, String)> {
    vec![
        ("service", "WFS".to_string()),
        ("version", "1.0.0".to_string()),
        ("request", "GetFeature".to_string()),
        ("typeName", type_name.to_string()),
        ("outputFormat", "application/json".to_string()),
        ("maxFeatures", max_features.to_string()),
    ]
}

/// GET against GeoServer; returns the body and its content type.
async fn fetch(
    client: &reqwest::Client,
    geoserver: &GeoServerSettings,
    params: &[(&'static str, String)],
) -> GisResult<(Option<String>, Bytes)> {
    let response = client
        .get(&geoserver.base_url)
        .query(params)
        .basic_auth(&geoserver.username, Some(&geoserver.password))
        .send()
        .await
        .map_err(|e| GisError::UpstreamError(format!("GeoServer request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| GisError::UpstreamError(format!("GeoServer returned an error: {}", e)))?;

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes()
        .await
        .map_err(|e| GisError::UpstreamError(format!("Failed to read GeoServer response: {}", e)))?;

    Ok((content_type, body))
}

/// GET /api/geoserver/:layer - WFS features of an allow-listed layer
#[instrument(skip(state))]
pub async fn wfs_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(layer): Path<String>,
) -> Response {
    metrics::record_request("geoserver_wfs");

    let Some(type_name) = state.catalog.geoserver.type_name(&layer) else {
        return ApiError::bad_request("Invalid layer name").into_response();
    };

    let params = wfs_query_params(type_name, state.catalog.geoserver.max_features);
    let result = fetch(&state.http, &state.config.geoserver, &params)
        .await
        .and_then(|(content_type, body)| match content_type {
            // GeoServer reports exceptions as XML with a 200 status
            Some(ct) if ct.contains("json") => Ok(body),
            other => Err(GisError::UpstreamError(format!(
                "Unexpected content type {:?}",
                other
            ))),
        });

    match result {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            metrics::record_proxy_error("wfs");
            error!(layer = %layer, type_name = %type_name, error = %e, "GeoServer proxy error");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch layer from GeoServer",
            )
            .into_response()
        }
    }
}

/// GET /api/geoserver - WMS GetMap tile as PNG
#[instrument(skip(state))]
pub async fn wms_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<WmsTileParams>,
) -> Response {
    metrics::record_request("geoserver_wms");

    let request = match params.validate() {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match fetch(&state.http, &state.config.geoserver, &request.query_params()).await {
        Ok((_, body)) => ([(header::CONTENT_TYPE, "image/png")], body).into_response(),
        Err(e) => {
            metrics::record_proxy_error("wms");
            error!(layer = %request.layer, error = %e, "WMS proxy error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch WMS tile.").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(bbox: &str) -> WmsTileParams {
        WmsTileParams {
            layer: Some("GMS:Nipas_".to_string()),
            bbox: Some(bbox.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_defaults() {
        let request = params("13358338.9,1878516.4,13396357.7,1917652.2")
            .validate()
            .unwrap();
        assert_eq!(request.width, 256);
        assert_eq!(request.height, 256);
        assert_eq!(request.srs, "EPSG:3857");
    }

    #[test]
    fn test_validate_rejects_bad_bbox() {
        assert!(params("1,2,3").validate().is_err());
        assert!(params("5,5,1,1").validate().is_err());
        assert!(params("a,b,c,d").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_size() {
        let mut p = params("0,0,1,1");
        p.width = Some("0".to_string());
        assert!(p.validate().is_err());
        p.width = Some("99999".to_string());
        assert!(p.validate().is_err());
        p.width = Some("512".to_string());
        assert_eq!(p.validate().unwrap().width, 512);
    }

    #[test]
    fn test_validate_requires_layer() {
        let p = WmsTileParams {
            bbox: Some("0,0,1,1".to_string()),
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(GisError::MissingParameter(_))));
    }

    #[test]
    fn test_getmap_params() {
        let request = params("0,0,1,1").validate().unwrap();
        let query = request.query_params();
        assert!(query.contains(&("request", "GetMap".to_string())));
        assert!(query.contains(&("layers", "GMS:Nipas_".to_string())));
        assert!(query.contains(&("transparent", "true".to_string())));
    }

    #[test]
    fn test_wfs_params() {
        let query = wfs_query_params("GMS:KBA_", 500_000);
        assert!(query.contains(&("typeName", "GMS:KBA_".to_string())));
        assert!(query.contains(&("maxFeatures", "500000".to_string())));
        assert!(query.contains(&("outputFormat", "application/json".to_string())));
    }
}
