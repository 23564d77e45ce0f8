//! dBASE III (`.dbf`) attribute table parsing.
//!
//! Layout:
//! - 32-byte header: record count (u32 LE at 4), header length (u16 LE at 8),
//!   record length (u16 LE at 10)
//! - 32-byte field descriptors until a 0x0D terminator
//! - fixed-width records, each prefixed by a deletion flag (`' '` or `'*'`)
//!
//! Text is decoded as windows-1252 unless the caller names another encoding.

use chrono::NaiveDate;
use encoding_rs::{Encoding, WINDOWS_1252};

use crate::attribute::AttributeValue;
use crate::ShapefileError;

const HEADER_TERMINATOR: u8 = 0x0D;
const END_OF_FILE: u8 = 0x1A;

/// A field (column) descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfField {
    pub name: String,
    pub field_type: char,
    pub length: usize,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbfRecord {
    pub deleted: bool,
    pub values: Vec<AttributeValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbfTable {
    pub fields: Vec<DbfField>,
    pub records: Vec<DbfRecord>,
}

/// Parse a complete `.dbf` buffer with windows-1252 text.
pub fn parse_dbf(data: &[u8]) -> Result<DbfTable, ShapefileError> {
    parse_dbf_with_encoding(data, WINDOWS_1252)
}

/// Parse a complete `.dbf` buffer, decoding names and text with `encoding`.
pub fn parse_dbf_with_encoding(
    data: &[u8],
    encoding: &'static Encoding,
) -> Result<DbfTable, ShapefileError> {
    if data.len() < 32 {
        return Err(ShapefileError::InvalidDbf(
            "Not enough data for header".to_string(),
        ));
    }

    let num_records = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;

    if header_len > data.len() {
        return Err(ShapefileError::Truncated {
            file: "dbf",
            offset: data.len(),
        });
    }

    let fields = parse_fields(&data[..header_len], encoding)?;

    let expected_len = 1 + fields.iter().map(|f| f.length).sum::<usize>();
    if record_len < expected_len {
        return Err(ShapefileError::InvalidDbf(format!(
            "Record length {} is shorter than the fields require ({})",
            record_len, expected_len
        )));
    }

    // The declared count is untrusted; reserve only what the buffer can hold.
    let available = (data.len() - header_len) / record_len;
    let mut records = Vec::with_capacity(num_records.min(available));
    for i in 0..num_records {
        let start = header_len + i * record_len;
        if data.get(start) == Some(&END_OF_FILE) {
            break;
        }
        let record = data
            .get(start..start + record_len)
            .ok_or(ShapefileError::Truncated {
                file: "dbf",
                offset: start,
            })?;

        let deleted = record[0] == b'*';
        let mut offset = 1;
        let mut values = Vec::with_capacity(fields.len());
        for field in &fields {
            values.push(decode_value(
                field,
                &record[offset..offset + field.length],
                encoding,
            ));
            offset += field.length;
        }
        records.push(DbfRecord { deleted, values });
    }

    Ok(DbfTable { fields, records })
}

fn parse_fields(
    header: &[u8],
    encoding: &'static Encoding,
) -> Result<Vec<DbfField>, ShapefileError> {
    let mut fields = Vec::new();
    let mut pos = 32;

    while pos < header.len() && header[pos] != HEADER_TERMINATOR {
        let descriptor = header
            .get(pos..pos + 32)
            .ok_or(ShapefileError::Truncated {
                file: "dbf",
                offset: pos,
            })?;

        let name_len = descriptor[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let (name, _) = encoding.decode_without_bom_handling(&descriptor[..name_len]);
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ShapefileError::InvalidDbf(format!(
                "Field descriptor at offset {} has no name",
                pos
            )));
        }

        fields.push(DbfField {
            name,
            field_type: descriptor[11] as char,
            length: descriptor[16] as usize,
            decimals: descriptor[17],
        });
        pos += 32;
    }

    Ok(fields)
}

/// Decode one fixed-width cell according to its field type.
pub fn decode_value(field: &DbfField, raw: &[u8], encoding: &'static Encoding) -> AttributeValue {
    if field.field_type == 'I' {
        return match raw {
            [a, b, c, d] => AttributeValue::Integer(i32::from_le_bytes([*a, *b, *c, *d]) as i64),
            _ => AttributeValue::Null,
        };
    }

    let (text, _) = encoding.decode_without_bom_handling(raw);
    let text = text.trim();

    match field.field_type {
        'N' | 'F' => decode_number(text, field.decimals),
        'L' => match text.chars().next() {
            Some('Y' | 'y' | 'T' | 't') => AttributeValue::Boolean(true),
            Some('N' | 'n' | 'F' | 'f') => AttributeValue::Boolean(false),
            _ => AttributeValue::Null,
        },
        'D' => decode_date(text),
        _ if text.is_empty() => AttributeValue::Null,
        _ => AttributeValue::Text(text.to_string()),
    }
}

fn decode_number(text: &str, decimals: u8) -> AttributeValue {
    if text.is_empty() || text.chars().all(|c| c == '*') {
        return AttributeValue::Null;
    }
    if decimals == 0 {
        if let Ok(v) = text.parse::<i64>() {
            return AttributeValue::Integer(v);
        }
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => AttributeValue::Float(v),
        _ => AttributeValue::Null,
    }
}

fn decode_date(text: &str) -> AttributeValue {
    if text.len() != 8 || !text.is_ascii() {
        return AttributeValue::Null;
    }
    let parsed = (
        text[0..4].parse::<i32>(),
        text[4..6].parse::<u32>(),
        text[6..8].parse::<u32>(),
    );
    match parsed {
        (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .map(AttributeValue::Date)
            .unwrap_or(AttributeValue::Null),
        _ => AttributeValue::Null,
    }
}
