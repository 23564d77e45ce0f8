//! PostgreSQL/PostGIS access for uploaded layers, editable tables and
//! named layer queries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use geo_format::{parse_wkt, to_wkt, Feature, FeatureCollection, Geometry};
use gis_common::{GisError, GisResult};
use shapefile_reader::{ShapeFeature, Shapefile};

use crate::layers::{LayerFormat, LayerQuery};
use crate::schema::{bind_text, TableSchema};
use crate::sql::{self, TableColumn};

/// Rows per `INSERT` statement during ingest.
const INSERT_BATCH_SIZE: usize = 100;

/// PostgreSQL's limit on bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Columns never shown or edited through the editables routes (lowercase).
const HIDDEN_EDITABLE_COLUMNS: [&str; 4] = ["geom", "latitude", "longitude", "_last_upda"];

const REGISTRY_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user_layers (
    id BIGSERIAL PRIMARY KEY,
    table_name VARCHAR(255) NOT NULL,
    layer_name VARCHAR(255) NOT NULL,
    group_name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    columns_json JSONB
)
"#;

/// Outcome of a shapefile ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub table_name: String,
    /// `{ field name: SQL type }`
    pub columns: Value,
    pub features_count: usize,
}

/// A row of the `user_layers` registry.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserLayer {
    pub id: i64,
    pub table_name: String,
    pub layer_name: String,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
    pub columns_json: Option<Value>,
}

fn db_err(e: sqlx::Error) -> GisError {
    GisError::DatabaseError(format!("Query failed: {}", e))
}

/// Rows per insert so a batch stays under the bind-parameter limit.
fn batch_size(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / (column_count + 1)).clamp(1, INSERT_BATCH_SIZE)
}

/// Text bound for `CAST($n AS type)` when updating a row.
fn json_bind_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parse stored WKT, logging and dropping geometry that does not parse.
fn geometry_from_wkt(table: &str, wkt: Option<&str>) -> Option<Geometry> {
    let wkt = wkt?;
    match parse_wkt(wkt) {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            warn!(table = %table, error = %e, "Skipping unparseable geometry");
            None
        }
    }
}

/// Database handle shared by all request handlers.
#[derive(Clone)]
pub struct SpatialStore {
    pool: PgPool,
}

impl SpatialStore {
    /// Connect to the database, failing if it is unreachable.
    pub async fn connect(database_url: &str) -> GisResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| GisError::DatabaseError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create a pool that connects on first use.
    pub fn connect_lazy(database_url: &str) -> GisResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(database_url)
            .map_err(|e| GisError::DatabaseError(format!("Invalid database URL: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Enable PostGIS when permitted and create the layer registry.
    pub async fn migrate(&self) -> GisResult<()> {
        if let Err(e) = sqlx::query("CREATE EXTENSION IF NOT EXISTS postgis")
            .execute(&self.pool)
            .await
        {
            warn!(error = %e, "Could not enable the postgis extension");
        }

        sqlx::query(REGISTRY_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| GisError::DatabaseError(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    pub async fn ping(&self) -> GisResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ========================================================================
    // Ingest
    // ========================================================================

    /// Create `table_name` from a shapefile and register it under `group_name`.
    ///
    /// Table creation, row inserts and registration run in one transaction,
    /// so a failure leaves no partial table behind.
    pub async fn ingest_shapefile(
        &self,
        table_name: &str,
        group_name: &str,
        shapefile: &Shapefile,
    ) -> GisResult<IngestSummary> {
        if shapefile.features.is_empty() {
            return Err(GisError::BadRequest(
                "Shapefile contains no features.".to_string(),
            ));
        }

        let schema = TableSchema::infer(table_name, &shapefile.features)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(&schema.table_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if exists {
            return Err(GisError::TableExists(schema.table_name));
        }

        sqlx::query(&schema.create_table_sql())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let batch = batch_size(schema.columns.len());
        for chunk in shapefile.features.chunks(batch) {
            let mut builder = insert_batch(&schema, chunk);
            builder.build().execute(&mut *tx).await.map_err(db_err)?;
        }

        sqlx::query(REGISTRY_SQL)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let columns = schema.columns_json();
        sqlx::query(
            "INSERT INTO user_layers (table_name, layer_name, group_name, columns_json) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&schema.table_name)
        .bind(&schema.table_name)
        .bind(group_name)
        .bind(&columns)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        info!(
            table = %schema.table_name,
            group = %group_name,
            features = shapefile.features.len(),
            columns = schema.columns.len(),
            "Ingested shapefile"
        );

        Ok(IngestSummary {
            table_name: schema.table_name,
            columns,
            features_count: shapefile.features.len(),
        })
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Registered layers, newest first.
    pub async fn list_uploaded_layers(&self) -> GisResult<Vec<UserLayer>> {
        sqlx::query_as::<_, UserLayer>(
            "SELECT id, table_name, layer_name, group_name, created_at, columns_json \
             FROM user_layers ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn is_registered(&self, table_name: &str) -> GisResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_layers WHERE table_name = $1)")
            .bind(table_name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Columns of `table_name` in ordinal order; empty when the table is missing.
    pub async fn table_columns(&self, table_name: &str) -> GisResult<Vec<TableColumn>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT column_name::text, udt_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(name, udt_name)| TableColumn { name, udt_name })
            .collect())
    }

    /// Read a registered layer back as a feature collection.
    pub async fn uploaded_layer_geojson(&self, table_name: &str) -> GisResult<FeatureCollection> {
        if !self.is_registered(table_name).await? {
            return Err(GisError::LayerNotFound(table_name.to_string()));
        }

        let attributes: Vec<String> = self
            .table_columns(table_name)
            .await?
            .into_iter()
            .map(|c| c.name)
            .filter(|name| name != "id" && name != "geom")
            .collect();

        let rows = sqlx::query_as::<_, (i64, Option<String>, Value)>(&sql::feature_rows_sql(
            table_name,
            &attributes,
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let features = rows
            .into_iter()
            .map(|(id, wkt, properties)| {
                let properties = match properties {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                Feature::new(geometry_from_wkt(table_name, wkt.as_deref()))
                    .with_properties(properties)
                    .with_id(id)
            })
            .collect();

        Ok(FeatureCollection::new().with_features(features))
    }

    // ========================================================================
    // Editable tables
    // ========================================================================

    /// Static tables followed by every registered table.
    pub async fn editable_tables(&self, static_tables: &[String]) -> GisResult<Vec<String>> {
        let uploaded: Vec<String> =
            sqlx::query_scalar("SELECT table_name FROM user_layers ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(static_tables.iter().cloned().chain(uploaded).collect())
    }

    /// Fail with `LayerNotFound` unless `table_name` is editable.
    pub async fn ensure_editable(&self, static_tables: &[String], table_name: &str) -> GisResult<()> {
        if static_tables.iter().any(|t| t == table_name) || self.is_registered(table_name).await? {
            Ok(())
        } else {
            Err(GisError::LayerNotFound(table_name.to_string()))
        }
    }

    /// Every row of an editable table, hiding geometry and coordinate columns.
    pub async fn editable_rows(&self, table_name: &str) -> GisResult<Vec<Value>> {
        let columns: Vec<TableColumn> = self
            .table_columns(table_name)
            .await?
            .into_iter()
            .filter(|c| !HIDDEN_EDITABLE_COLUMNS.contains(&c.name.to_lowercase().as_str()))
            .collect();

        if columns.is_empty() {
            return Err(GisError::NotFound("No displayable columns found.".to_string()));
        }

        sqlx::query_scalar::<_, Value>(&sql::json_rows_sql(table_name, &columns, None))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Update one row by id; values are cast to each column's declared type.
    pub async fn update_row(
        &self,
        table_name: &str,
        id: i64,
        updates: &Map<String, Value>,
    ) -> GisResult<()> {
        let fields: Vec<(&String, &Value)> = updates
            .iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case("id"))
            .collect();
        if fields.is_empty() {
            return Err(GisError::BadRequest("No valid fields to update.".to_string()));
        }

        let columns = self.table_columns(table_name).await?;
        let assignments = fields
            .iter()
            .map(|(key, _)| {
                columns
                    .iter()
                    .find(|c| &c.name == *key)
                    .cloned()
                    .ok_or_else(|| GisError::invalid(key.as_str(), "Unknown column"))
            })
            .collect::<GisResult<Vec<_>>>()?;

        let statement = sql::update_row_sql(table_name, &assignments);
        let mut query = sqlx::query(&statement);
        for (_, value) in &fields {
            query = query.bind(json_bind_text(value));
        }
        let result = query
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(GisError::NotFound(format!(
                "Row {} not found in {}",
                id, table_name
            )));
        }
        debug!(table = %table_name, id, fields = fields.len(), "Updated row");
        Ok(())
    }

    pub async fn delete_row(&self, table_name: &str, id: i64) -> GisResult<()> {
        let result = sqlx::query(&sql::delete_row_sql(table_name))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(GisError::NotFound(format!(
                "Row {} not found in {}",
                id, table_name
            )));
        }
        debug!(table = %table_name, id, "Deleted row");
        Ok(())
    }

    // ========================================================================
    // Named layers
    // ========================================================================

    /// Run a named layer query in its configured format.
    pub async fn run_layer(&self, layer: &LayerQuery) -> GisResult<Value> {
        match layer.format {
            LayerFormat::Features => {
                let features = self.layer_features(layer).await?;
                Ok(serde_json::to_value(features)?)
            }
            LayerFormat::Raw => Ok(Value::Array(self.layer_rows(layer).await?)),
        }
    }

    /// Rows of a layer as features numbered by `objectID` from 1.
    pub async fn layer_features(&self, layer: &LayerQuery) -> GisResult<Vec<Feature>> {
        let rows = sqlx::query_as::<_, (Option<String>, Value)>(&sql::layer_features_sql(layer))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (wkt, properties))| {
                let mut feature = Feature::new(geometry_from_wkt(&layer.table, wkt.as_deref()))
                    .with_property("objectID", i + 1);
                if let Value::Object(map) = properties {
                    feature.properties.extend(map);
                }
                feature
            })
            .collect())
    }

    /// Every column of a layer's rows, geography rendered as WKT.
    pub async fn layer_rows(&self, layer: &LayerQuery) -> GisResult<Vec<Value>> {
        let columns = self.table_columns(&layer.table).await?;
        if columns.is_empty() {
            return Err(GisError::NotFound(format!(
                "Table {} does not exist",
                layer.table
            )));
        }

        sqlx::query_scalar::<_, Value>(&sql::json_rows_sql(&layer.table, &columns, layer.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }
}

/// Multi-row `INSERT` for one batch of features.
fn insert_batch<'a>(schema: &TableSchema, features: &'a [ShapeFeature]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(schema.insert_prefix());
    builder.push_values(features, |mut row, feature| {
        let wkt = feature.geometry.as_ref().map(|g| to_wkt(&g.normalized()));
        row.push("ST_GeogFromText(")
            .push_bind_unseparated(wkt)
            .push_unseparated(")");

        for (index, column) in schema.columns.iter().enumerate() {
            let value = feature
                .attributes
                .get(index)
                .filter(|(name, _)| name == &column.source_name)
                .and_then(|(_, value)| bind_text(value));
            row.push("CAST(")
                .push_bind_unseparated(value)
                .push_unseparated(format!(" AS {})", column.column_type.sql()));
        }
    });
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(0), 100);
        assert_eq!(batch_size(12), 100);
        assert_eq!(batch_size(1000), 65);
        assert_eq!(batch_size(100_000), 1);
    }

    #[test]
    fn test_json_bind_text() {
        assert_eq!(json_bind_text(&Value::Null), None);
        assert_eq!(json_bind_text(&Value::from("Abra")).as_deref(), Some("Abra"));
        assert_eq!(json_bind_text(&Value::from(12.5)).as_deref(), Some("12.5"));
        assert_eq!(json_bind_text(&Value::from(true)).as_deref(), Some("true"));
    }

    #[test]
    fn test_geometry_from_wkt() {
        assert_eq!(
            geometry_from_wkt("t", Some("POINT(121 17)")),
            Some(Geometry::point(121.0, 17.0))
        );
        assert_eq!(geometry_from_wkt("t", Some("not wkt")), None);
        assert_eq!(geometry_from_wkt("t", None), None);
    }

    #[test]
    fn test_insert_batch_sql() {
        use shapefile_reader::AttributeValue;

        let features = vec![ShapeFeature {
            geometry: Some(Geometry::point(121.0, 17.0)),
            attributes: vec![("NAME".to_string(), AttributeValue::Text("Abra".into()))],
        }];
        let schema = TableSchema::infer("basins", &features).unwrap();
        let builder = insert_batch(&schema, &features);
        assert_eq!(
            builder.sql(),
            "INSERT INTO \"basins\" (geom, \"NAME\") VALUES (ST_GeogFromText($1), CAST($2 AS VARCHAR(255)))"
        );
    }
}
