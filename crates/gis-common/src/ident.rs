//! SQL identifier handling for dynamically named tables and columns.

use crate::error::{GisError, GisResult};

/// PostgreSQL truncates identifiers longer than this.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a user-supplied table name.
///
/// Accepted names start with a letter or underscore and contain only
/// ASCII letters, digits and underscores.
pub fn validate_table_name(name: &str) -> GisResult<&str> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if name.is_empty() {
        return Err(GisError::MissingParameter("tableName".to_string()));
    }
    if !valid_start || !valid_rest || name.len() > MAX_IDENTIFIER_LEN {
        return Err(GisError::invalid(
            "tableName",
            format!("'{}' is not a valid table name", name),
        ));
    }
    Ok(name)
}

/// Replace every character outside `[A-Za-z0-9_]` with an underscore.
pub fn sanitize_column_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
