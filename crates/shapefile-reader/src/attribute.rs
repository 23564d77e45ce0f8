//! Typed attribute values read from `.dbf` records.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// A single decoded `.dbf` cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Date(NaiveDate),
}

impl AttributeValue {
    /// JSON representation used in GeoJSON properties.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Integer(v) => Value::from(*v),
            AttributeValue::Float(v) => Value::from(*v),
            AttributeValue::Boolean(v) => Value::Bool(*v),
            AttributeValue::Text(v) => Value::String(v.clone()),
            AttributeValue::Date(v) => Value::String(v.format("%Y-%m-%d").to_string()),
        }
    }
}
