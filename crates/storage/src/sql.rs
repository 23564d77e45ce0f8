//! SQL text for dynamically named tables.
//!
//! Table and column names cannot be bound as parameters, so they are
//! quoted here; every value is left to a `$n` placeholder.

use gis_common::quote_ident;

use crate::layers::LayerQuery;

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    /// Underlying type name, e.g. `int8`, `varchar`, `geography`.
    pub udt_name: String,
}

impl TableColumn {
    pub fn new(name: &str, udt_name: &str) -> Self {
        Self {
            name: name.to_string(),
            udt_name: udt_name.to_string(),
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self.udt_name.as_str(), "geography" | "geometry")
    }

    /// Select-list entry; spatial columns are rendered as WKT.
    fn select_expr(&self) -> String {
        let ident = quote_ident(&self.name);
        if self.is_spatial() {
            format!("ST_AsText({0}) AS {0}", ident)
        } else {
            ident
        }
    }
}

fn limit_clause(limit: Option<u32>) -> String {
    limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default()
}

/// Correlated subquery producing a JSON object of `columns` from alias `t`,
/// keys in the given order.
pub fn json_object_of(columns: &[String]) -> String {
    if columns.is_empty() {
        return "'{}'::json".to_string();
    }
    let list = columns
        .iter()
        .map(|c| format!("t.{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("(SELECT row_to_json(r) FROM (SELECT {}) r)", list)
}

/// Select `id`, geometry as WKT and attribute JSON from an uploaded table.
pub fn feature_rows_sql(table: &str, columns: &[String]) -> String {
    format!(
        "SELECT t.id, ST_AsText(t.geom) AS wkt, {} AS properties FROM {} t ORDER BY t.id",
        json_object_of(columns),
        quote_ident(table)
    )
}

/// Select `columns` of every row as one JSON object per row.
pub fn json_rows_sql(table: &str, columns: &[TableColumn], limit: Option<u32>) -> String {
    let list = columns
        .iter()
        .map(TableColumn::select_expr)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT row_to_json(r) FROM (SELECT {} FROM {}{}) r",
        list,
        quote_ident(table),
        limit_clause(limit)
    )
}

/// Select geometry WKT and the property columns of a named layer.
pub fn layer_features_sql(layer: &LayerQuery) -> String {
    let wkt = match &layer.geometry_column {
        Some(column) => format!("ST_AsText(t.{})", quote_ident(column)),
        None => "NULL::text".to_string(),
    };
    format!(
        "SELECT {} AS wkt, {} AS properties FROM {} t{}",
        wkt,
        json_object_of(&layer.properties),
        quote_ident(&layer.table),
        limit_clause(layer.limit)
    )
}

/// `UPDATE` assigning each column from a text parameter cast to its type.
///
/// Parameters are numbered from `$1` in column order and the row id is
/// the last parameter.
pub fn update_row_sql(table: &str, assignments: &[TableColumn]) -> String {
    let set_clauses = assignments
        .iter()
        .enumerate()
        .map(|(i, column)| {
            format!(
                "{} = CAST(${} AS {})",
                quote_ident(&column.name),
                i + 1,
                quote_ident(&column.udt_name)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE id = ${}",
        quote_ident(table),
        set_clauses,
        assignments.len() + 1
    )
}

/// `DELETE` a single row by id.
pub fn delete_row_sql(table: &str) -> String {
    format!("DELETE FROM {} WHERE id = $1", quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_feature_rows_sql() {
        assert_eq!(
            feature_rows_sql("basins", &cols(&["name", "AREA"])),
            "SELECT t.id, ST_AsText(t.geom) AS wkt, \
             (SELECT row_to_json(r) FROM (SELECT t.\"name\", t.\"AREA\") r) AS properties \
             FROM \"basins\" t ORDER BY t.id"
        );
    }

    #[test]
    fn test_feature_rows_sql_without_attributes() {
        assert!(feature_rows_sql("bare", &[]).contains("'{}'::json AS properties"));
    }

    #[test]
    fn test_json_rows_sql() {
        let columns = vec![TableColumn::new("id", "int8"), TableColumn::new("Station", "varchar")];
        assert_eq!(
            json_rows_sql("SurficialSedimentSurvey", &columns, None),
            "SELECT row_to_json(r) FROM (SELECT \"id\", \"Station\" FROM \"SurficialSedimentSurvey\") r"
        );
    }

    #[test]
    fn test_json_rows_sql_renders_geography_as_wkt() {
        let columns = vec![TableColumn::new("name", "varchar"), TableColumn::new("geom", "geography")];
        assert_eq!(
            json_rows_sql("regions", &columns, Some(10)),
            "SELECT row_to_json(r) FROM (SELECT \"name\", ST_AsText(\"geom\") AS \"geom\" FROM \"regions\" LIMIT 10) r"
        );
    }

    #[test]
    fn test_layer_features_sql() {
        let layer = LayerQuery::features("getLandCover", "land_cover_map_r2", &["class_name", "province"])
            .with_limit(1000);
        assert_eq!(
            layer_features_sql(&layer),
            "SELECT ST_AsText(t.\"geom\") AS wkt, \
             (SELECT row_to_json(r) FROM (SELECT t.\"class_name\", t.\"province\") r) AS properties \
             FROM \"land_cover_map_r2\" t LIMIT 1000"
        );
    }

    #[test]
    fn test_layer_features_sql_without_geometry() {
        let mut layer = LayerQuery::features("getCodes", "codes", &[]);
        layer.geometry_column = None;
        assert_eq!(
            layer_features_sql(&layer),
            "SELECT NULL::text AS wkt, '{}'::json AS properties FROM \"codes\" t"
        );
    }

    #[test]
    fn test_update_row_sql() {
        let assignments = vec![TableColumn::new("name", "varchar"), TableColumn::new("area", "float8")];
        assert_eq!(
            update_row_sql("basins", &assignments),
            "UPDATE \"basins\" SET \"name\" = CAST($1 AS \"varchar\"), \"area\" = CAST($2 AS \"float8\") WHERE id = $3"
        );
    }

    #[test]
    fn test_delete_row_sql_quotes_table() {
        assert_eq!(
            delete_row_sql("x\"; DROP TABLE y; --"),
            "DELETE FROM \"x\"\"; DROP TABLE y; --\" WHERE id = $1"
        );
    }
}
