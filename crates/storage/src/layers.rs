//! Named layer queries served under `/layer/:name`.

use serde::{Deserialize, Serialize};

/// Response shape of a named layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerFormat {
    /// Array of GeoJSON features with an `objectID` property.
    #[default]
    Features,
    /// Every row as a plain JSON object.
    Raw,
}

/// A fixed query over one table, exposed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerQuery {
    pub name: String,
    pub table: String,
    /// Column holding the geography; rendered as WKT in raw rows.
    #[serde(default = "default_geometry_column")]
    pub geometry_column: Option<String>,
    /// Columns copied into feature properties, in order.
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: LayerFormat,
}

fn default_geometry_column() -> Option<String> {
    Some("geom".to_string())
}

impl LayerQuery {
    pub fn features(name: &str, table: &str, properties: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            geometry_column: default_geometry_column(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
            limit: None,
            format: LayerFormat::Features,
        }
    }

    pub fn raw(name: &str, table: &str) -> Self {
        Self {
            format: LayerFormat::Raw,
            ..Self::features(name, table, &[])
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Layers available when no configuration overrides them.
pub fn default_layers() -> Vec<LayerQuery> {
    vec![
        LayerQuery::features("getRiverBasin", "major_river_basins", &["name"]),
        LayerQuery::features("getLandCover", "land_cover_map_r2", &["class_name", "province"])
            .with_limit(1000),
        LayerQuery::features("getPointsHeat", "forestcoverloss_isabela", &["pointid", "grid_code"]),
        LayerQuery::raw("getBarangays", "barangays"),
        LayerQuery::raw("getRegions", "regions"),
        LayerQuery::features("getRoadNetworks", "roadnetwork", &["osm_id"]),
    ]
}

/// Table dumped by the diagnostics route.
pub fn default_diagnostics() -> LayerQuery {
    LayerQuery::raw("getTest", "majorriverbasin_gj")
}

/// Curated tables editable alongside uploaded ones.
pub fn default_static_editables() -> Vec<String> {
    vec!["SurficialSedimentSurvey".to_string()]
}
