//! Round-trip tests against a live PostGIS database.
//!
//! Set `TEST_DATABASE_URL` to run them; each test uses its own table names.

use serde_json::{json, Map, Value};

use geo_format::Geometry;
use gis_common::GisError;
use shapefile_reader::read_shapefile;
use storage::layers::LayerQuery;
use storage::SpatialStore;
use test_utils::coords::{ABRA_HOLE_CCW, ABRA_SQUARE_CW};
use test_utils::{assert_approx_eq, require_env, DbfBuilder, ShpBuilder};

async fn store(url: &str) -> SpatialStore {
    let store = SpatialStore::connect(url).await.unwrap();
    store.migrate().await.unwrap();
    store
}

async fn drop_table(store: &SpatialStore, table: &str) {
    sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
        .execute(store.pool())
        .await
        .unwrap();
    sqlx::query("DELETE FROM user_layers WHERE table_name = $1")
        .bind(table)
        .execute(store.pool())
        .await
        .unwrap();
}

fn basin_shapefile() -> shapefile_reader::Shapefile {
    let shp = ShpBuilder::new(5)
        .polygon(vec![ABRA_SQUARE_CW.to_vec(), ABRA_HOLE_CCW.to_vec()])
        .polygon(vec![ABRA_SQUARE_CW.to_vec()])
        .build();
    let dbf = DbfBuilder::new()
        .character("name", 32)
        .numeric("area_km2", 10, 2)
        .record(&["Abra River Basin", "5125.00"])
        .record(&["Abra Upper", "812.50"])
        .build();
    read_shapefile(&shp, &dbf).unwrap()
}

#[tokio::test]
async fn test_ingest_and_read_back() {
    let url = require_env!("TEST_DATABASE_URL");
    let store = store(&url).await;
    let table = "test_ingest_read_back";
    drop_table(&store, table).await;

    let summary = store
        .ingest_shapefile(table, "River Basins", &basin_shapefile())
        .await
        .unwrap();
    assert_eq!(summary.features_count, 2);
    assert_eq!(
        summary.columns,
        json!({"name": "VARCHAR(255)", "area_km2": "DOUBLE PRECISION"})
    );

    let layers = store.list_uploaded_layers().await.unwrap();
    let registered = layers.iter().find(|l| l.table_name == table).unwrap();
    assert_eq!(registered.group_name, "River Basins");

    let collection = store.uploaded_layer_geojson(table).await.unwrap();
    assert_eq!(collection.features.len(), 2);
    let first = &collection.features[0];
    assert_eq!(first.properties["name"], "Abra River Basin");
    assert_approx_eq!(first.properties["area_km2"].as_f64().unwrap(), 5125.0, 1e-9);
    match &first.geometry {
        Some(Geometry::Polygon { coordinates }) => assert_eq!(coordinates.len(), 2),
        other => panic!("expected polygon, got {:?}", other),
    }

    drop_table(&store, table).await;
}

#[tokio::test]
async fn test_ingest_existing_table_is_rejected() {
    let url = require_env!("TEST_DATABASE_URL");
    let store = store(&url).await;
    let table = "test_ingest_existing";
    drop_table(&store, table).await;

    store
        .ingest_shapefile(table, "g", &basin_shapefile())
        .await
        .unwrap();
    let err = store
        .ingest_shapefile(table, "g", &basin_shapefile())
        .await
        .unwrap_err();
    assert!(matches!(err, GisError::TableExists(_)));

    drop_table(&store, table).await;
}

#[tokio::test]
async fn test_edit_and_delete_rows() {
    let url = require_env!("TEST_DATABASE_URL");
    let store = store(&url).await;
    let table = "test_edit_rows";
    drop_table(&store, table).await;

    store
        .ingest_shapefile(table, "g", &basin_shapefile())
        .await
        .unwrap();

    let tables = store.editable_tables(&["Curated".to_string()]).await.unwrap();
    assert_eq!(tables[0], "Curated");
    assert!(tables.iter().any(|t| t == table));

    let rows = store.editable_rows(table).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].get("geom").is_none());
    let id = rows[0]["id"].as_i64().unwrap();

    let mut updates = Map::new();
    updates.insert("id".to_string(), Value::from(999));
    updates.insert("name".to_string(), Value::from("Renamed"));
    updates.insert("area_km2".to_string(), Value::from(10));
    store.update_row(table, id, &updates).await.unwrap();

    let rows = store.editable_rows(table).await.unwrap();
    let edited = rows.iter().find(|r| r["id"] == id).unwrap();
    assert_eq!(edited["name"], "Renamed");
    assert_eq!(edited["area_km2"], 10.0);

    let mut unknown = Map::new();
    unknown.insert("missing".to_string(), Value::from(1));
    assert!(matches!(
        store.update_row(table, id, &unknown).await,
        Err(GisError::InvalidParameter { .. })
    ));

    store.delete_row(table, id).await.unwrap();
    assert!(matches!(
        store.delete_row(table, id).await,
        Err(GisError::NotFound(_))
    ));

    drop_table(&store, table).await;
}

#[tokio::test]
async fn test_layer_features_numbering() {
    let url = require_env!("TEST_DATABASE_URL");
    let store = store(&url).await;
    let table = "test_layer_numbering";
    drop_table(&store, table).await;

    store
        .ingest_shapefile(table, "g", &basin_shapefile())
        .await
        .unwrap();

    let layer = LayerQuery::features("getBasins", table, &["name"]).with_limit(1);
    let features = store.layer_features(&layer).await.unwrap();
    assert_eq!(features.len(), 1);
    let keys: Vec<&str> = features[0].properties.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["objectID", "name"]);
    assert_eq!(features[0].properties["objectID"], 1);

    let raw = store
        .layer_rows(&LayerQuery::raw("getBasinsRaw", table))
        .await
        .unwrap();
    assert!(raw[0]["geom"].as_str().unwrap().starts_with("POLYGON"));

    drop_table(&store, table).await;
}

#[tokio::test]
async fn test_unregistered_layer_is_not_found() {
    let url = require_env!("TEST_DATABASE_URL");
    let store = store(&url).await;

    assert!(matches!(
        store.uploaded_layer_geojson("test_never_uploaded").await,
        Err(GisError::LayerNotFound(_))
    ));
}
