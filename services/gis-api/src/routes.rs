//! Router assembly.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth;
use crate::config::ApiConfig;
use crate::handlers;
use crate::state::AppState;

/// CORS for the dashboard client and GeoServer origins, with credentials.
pub fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Invalid CORS origin; skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
}

fn dataset_routes() -> Router {
    Router::new()
        .route(
            "/shapefiles",
            post(handlers::datasets::upload_shapefile_handler),
        )
        .route(
            "/uploaded-layers",
            get(handlers::datasets::uploaded_layers_handler),
        )
        .route(
            "/uploaded-layer/:layer_id",
            get(handlers::datasets::uploaded_layer_handler),
        )
        .route(
            "/editables/tables",
            get(handlers::datasets::editable_tables_handler),
        )
        .route(
            "/editables/:table_name",
            get(handlers::datasets::editable_rows_handler),
        )
        .route(
            "/editables/:table_name/:id",
            put(handlers::datasets::update_row_handler)
                .delete(handlers::datasets::delete_row_handler),
        )
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .nest("/datasets", dataset_routes())
        // Named layers
        .route("/layer/:name", get(handlers::layers::layer_handler))
        // GeoServer proxy
        .route("/api/geoserver", get(handlers::geoserver::wms_handler))
        .route(
            "/api/geoserver/:layer",
            get(handlers::geoserver::wfs_handler),
        )
        // Diagnostics
        .route(
            "/test/getTest",
            get(handlers::diagnostics::get_test_handler),
        );

    let protected = if state.config.auth.enabled {
        protected.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
    } else {
        warn!("Authentication is disabled; all routes are public");
        protected
    };

    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        .merge(protected)
        // Middleware
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(Extension(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
}
