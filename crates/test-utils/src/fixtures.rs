//! Common test fixtures for GIS dashboard tests.

/// Coordinates used across tests (longitude, latitude).
pub mod coords {
    /// Square around Bangued, Abra; clockwise (shapefile exterior ring order).
    pub const ABRA_SQUARE_CW: [[f64; 2]; 5] = [
        [120.5, 17.5],
        [120.5, 17.7],
        [120.7, 17.7],
        [120.7, 17.5],
        [120.5, 17.5],
    ];

    /// Hole inside the Abra square, counter-clockwise (shapefile hole order).
    pub const ABRA_HOLE_CCW: [[f64; 2]; 4] = [
        [120.55, 17.55],
        [120.65, 17.55],
        [120.65, 17.65],
        [120.55, 17.55],
    ];

    /// Separate clockwise square near Tuguegarao, Cagayan.
    pub const CAGAYAN_SQUARE_CW: [[f64; 2]; 5] = [
        [121.7, 17.6],
        [121.7, 17.7],
        [121.8, 17.7],
        [121.8, 17.6],
        [121.7, 17.6],
    ];
}

/// Layer names used in configuration tests.
pub mod layers {
    /// WFS alias for the national road network.
    pub const NATIONAL_ROADS: &str = "nationalRoads";

    /// Qualified GeoServer type name for the national road network.
    pub const NATIONAL_ROADS_TYPE: &str = "GMS:hotosm_phl_roads_lines_shp";

    /// Named layer route for river basins.
    pub const RIVER_BASIN: &str = "getRiverBasin";
}
