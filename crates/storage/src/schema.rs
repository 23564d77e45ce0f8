//! Table schemas inferred from uploaded shapefile attributes.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use gis_common::{quote_ident, sanitize_column_name, validate_table_name, GisResult};
use shapefile_reader::{AttributeValue, ShapeFeature};

/// Text longer than this is stored unbounded.
const VARCHAR_LIMIT: usize = 255;

/// Column names every uploaded table reserves for itself.
const RESERVED_COLUMNS: [&str; 2] = ["id", "geom"];

/// SQL column types an attribute can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlColumnType {
    #[serde(rename = "BIGINT")]
    BigInt,
    #[serde(rename = "DOUBLE PRECISION")]
    DoublePrecision,
    #[serde(rename = "BOOLEAN")]
    Boolean,
    #[serde(rename = "TIMESTAMP")]
    Timestamp,
    #[serde(rename = "VARCHAR(255)")]
    Varchar255,
    #[serde(rename = "TEXT")]
    Text,
}

impl SqlColumnType {
    /// Type for a single value; `None` for nulls, which carry no information.
    pub fn of_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Null => None,
            AttributeValue::Integer(_) => Some(SqlColumnType::BigInt),
            AttributeValue::Float(_) => Some(SqlColumnType::DoublePrecision),
            AttributeValue::Boolean(_) => Some(SqlColumnType::Boolean),
            AttributeValue::Date(_) => Some(SqlColumnType::Timestamp),
            AttributeValue::Text(s) if s.chars().count() > VARCHAR_LIMIT => {
                Some(SqlColumnType::Text)
            }
            AttributeValue::Text(_) => Some(SqlColumnType::Varchar255),
        }
    }

    /// Smallest type able to hold values of both `self` and `other`.
    pub fn widen(self, other: Self) -> Self {
        use SqlColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (BigInt, DoublePrecision) | (DoublePrecision, BigInt) => DoublePrecision,
            (Varchar255, Text) | (Text, Varchar255) => Text,
            // Anything else only fits as text
            _ => Text,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SqlColumnType::BigInt => "BIGINT",
            SqlColumnType::DoublePrecision => "DOUBLE PRECISION",
            SqlColumnType::Boolean => "BOOLEAN",
            SqlColumnType::Timestamp => "TIMESTAMP",
            SqlColumnType::Varchar255 => "VARCHAR(255)",
            SqlColumnType::Text => "TEXT",
        }
    }
}

/// Render an attribute as the text bound for `CAST($n AS type)`.
pub fn bind_text(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Integer(v) => Some(v.to_string()),
        AttributeValue::Float(v) => Some(v.to_string()),
        AttributeValue::Boolean(v) => Some(v.to_string()),
        AttributeValue::Text(v) => Some(v.clone()),
        AttributeValue::Date(v) => Some(v.format("%Y-%m-%d").to_string()),
    }
}

/// One attribute column of an uploaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Field name as it appears in the `.dbf`.
    pub source_name: String,
    /// Sanitized, de-duplicated SQL column name.
    pub column_name: String,
    pub column_type: SqlColumnType,
}

/// Schema of a table created from an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Infer a schema from the attribute fields of `features`.
    ///
    /// Column order follows the first feature's field order. Each column
    /// takes the widest type seen across all features; a column that is
    /// null everywhere becomes `VARCHAR(255)`.
    pub fn infer(table_name: &str, features: &[ShapeFeature]) -> GisResult<Self> {
        let table_name = validate_table_name(table_name)?.to_string();

        let field_names: Vec<&str> = features
            .first()
            .map(|f| f.attributes.iter().map(|(name, _)| name.as_str()).collect())
            .unwrap_or_default();

        let mut used: HashSet<String> = RESERVED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut columns = Vec::with_capacity(field_names.len());

        for (index, source_name) in field_names.iter().enumerate() {
            let column_type = features
                .iter()
                .filter_map(|f| f.attributes.get(index))
                .filter(|(name, _)| name.as_str() == *source_name)
                .filter_map(|(_, value)| SqlColumnType::of_value(value))
                .reduce(SqlColumnType::widen)
                .unwrap_or(SqlColumnType::Varchar255);

            let column_name = unique_name(sanitize_column_name(source_name), &mut used);
            columns.push(ColumnSpec {
                source_name: source_name.to_string(),
                column_name,
                column_type,
            });
        }

        Ok(Self {
            table_name,
            columns,
        })
    }

    /// `CREATE TABLE` statement for this schema.
    pub fn create_table_sql(&self) -> String {
        let mut sql = format!(
            "CREATE TABLE {} (\n  id BIGSERIAL PRIMARY KEY,\n  geom GEOGRAPHY(Geometry, 4326)",
            quote_ident(&self.table_name)
        );
        for column in &self.columns {
            sql.push_str(&format!(
                ",\n  {} {}",
                quote_ident(&column.column_name),
                column.column_type.sql()
            ));
        }
        sql.push_str("\n)");
        sql
    }

    /// `INSERT INTO t (geom, ...) ` prefix for batched inserts.
    pub fn insert_prefix(&self) -> String {
        let mut sql = format!("INSERT INTO {} (geom", quote_ident(&self.table_name));
        for column in &self.columns {
            sql.push_str(", ");
            sql.push_str(&quote_ident(&column.column_name));
        }
        sql.push_str(") ");
        sql
    }

    /// `{ field name: SQL type }`, in column order.
    pub fn columns_json(&self) -> Value {
        let map: Map<String, Value> = self
            .columns
            .iter()
            .map(|c| {
                (
                    c.source_name.clone(),
                    Value::String(c.column_type.sql().to_string()),
                )
            })
            .collect();
        Value::Object(map)
    }
}

/// Make `name` unique against `used` (case-insensitively) by suffixing `_n`.
fn unique_name(name: String, used: &mut HashSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 1;
    while used.contains(&candidate.to_lowercase()) {
        candidate = format!("{}_{}", name, n);
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}
