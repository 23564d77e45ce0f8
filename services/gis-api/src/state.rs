//! Application state for the GIS API.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Duration;

use storage::SpatialStore;

use crate::config::{ApiConfig, GisConfig};

/// Timeout for GeoServer requests; WFS responses can be large.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared application state.
pub struct AppState {
    /// Spatial database access.
    pub store: SpatialStore,

    /// Client for the auth service and GeoServer.
    pub http: reqwest::Client,

    /// Resolved command line / environment settings.
    pub config: ApiConfig,

    /// Named layers and GeoServer allow-list.
    pub catalog: GisConfig,

    /// Prometheus exporter; absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Connect to the database, run migrations and load the YAML catalog.
    pub async fn new(config: ApiConfig, prometheus: Option<PrometheusHandle>) -> Result<Self> {
        let store = SpatialStore::connect(&config.database_url)
            .await
            .context("Failed to connect to database")?;
        store.migrate().await.context("Failed to run migrations")?;

        let catalog = GisConfig::load_from_dir(&config.config_dir)?;

        Self::with_store(store, config, catalog, prometheus)
    }

    /// Assemble state around an existing store.
    pub fn with_store(
        store: SpatialStore,
        config: ApiConfig,
        catalog: GisConfig,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            store,
            http,
            config,
            catalog,
            prometheus,
        })
    }
}
