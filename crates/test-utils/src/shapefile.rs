//! Builders for synthetic ESRI shapefile buffers.
//!
//! Produce `.shp` and `.dbf` bytes in memory so readers and upload
//! handlers can be tested without fixture files on disk.

use bytes::Bytes;

const SHP_FILE_CODE: i32 = 9994;
const SHP_VERSION: i32 = 1000;

/// Builds a `.shp` buffer one record at a time.
#[derive(Debug, Clone)]
pub struct ShpBuilder {
    shape_type: i32,
    records: Vec<Vec<u8>>,
    xy: Vec<[f64; 2]>,
}

impl ShpBuilder {
    /// Start a file whose header declares `shape_type`.
    pub fn new(shape_type: i32) -> Self {
        Self {
            shape_type,
            records: Vec::new(),
            xy: Vec::new(),
        }
    }

    /// Append a Null shape record.
    pub fn null(mut self) -> Self {
        self.records.push(0i32.to_le_bytes().to_vec());
        self
    }

    /// Append a Point record.
    pub fn point(mut self, x: f64, y: f64) -> Self {
        let mut content = 1i32.to_le_bytes().to_vec();
        content.extend_from_slice(&x.to_le_bytes());
        content.extend_from_slice(&y.to_le_bytes());
        self.xy.push([x, y]);
        self.records.push(content);
        self
    }

    /// Append a PointZ record (x, y, z, m).
    pub fn point_z(mut self, x: f64, y: f64, z: f64, m: f64) -> Self {
        let mut content = 11i32.to_le_bytes().to_vec();
        for v in [x, y, z, m] {
            content.extend_from_slice(&v.to_le_bytes());
        }
        self.xy.push([x, y]);
        self.records.push(content);
        self
    }

    /// Append a MultiPoint record.
    pub fn multipoint(mut self, points: &[[f64; 2]]) -> Self {
        let mut content = 8i32.to_le_bytes().to_vec();
        push_bbox(&mut content, points);
        content.extend_from_slice(&(points.len() as i32).to_le_bytes());
        for p in points {
            content.extend_from_slice(&p[0].to_le_bytes());
            content.extend_from_slice(&p[1].to_le_bytes());
        }
        self.xy.extend_from_slice(points);
        self.records.push(content);
        self
    }

    /// Append a PolyLine record with one or more parts.
    pub fn polyline(self, parts: Vec<Vec<[f64; 2]>>) -> Self {
        self.multi_part(3, parts)
    }

    /// Append a Polygon record. Rings are written exactly as given.
    pub fn polygon(self, rings: Vec<Vec<[f64; 2]>>) -> Self {
        self.multi_part(5, rings)
    }

    /// Append a PolygonZ record; z values are all zero and m is omitted.
    pub fn polygon_z(mut self, rings: Vec<Vec<[f64; 2]>>) -> Self {
        let total: usize = rings.iter().map(Vec::len).sum();
        self = self.multi_part(15, rings);
        if let Some(content) = self.records.last_mut() {
            // z range + z values
            for _ in 0..(2 + total) {
                content.extend_from_slice(&0f64.to_le_bytes());
            }
        }
        self
    }

    fn multi_part(mut self, shape_type: i32, parts: Vec<Vec<[f64; 2]>>) -> Self {
        let all: Vec<[f64; 2]> = parts.iter().flatten().copied().collect();
        let mut content = shape_type.to_le_bytes().to_vec();
        push_bbox(&mut content, &all);
        content.extend_from_slice(&(parts.len() as i32).to_le_bytes());
        content.extend_from_slice(&(all.len() as i32).to_le_bytes());
        let mut offset = 0i32;
        for part in &parts {
            content.extend_from_slice(&offset.to_le_bytes());
            offset += part.len() as i32;
        }
        for p in &all {
            content.extend_from_slice(&p[0].to_le_bytes());
            content.extend_from_slice(&p[1].to_le_bytes());
        }
        self.xy.extend(all);
        self.records.push(content);
        self
    }

    /// Assemble the file: 100-byte header followed by the records.
    pub fn build(&self) -> Bytes {
        let body_len: usize = self.records.iter().map(|r| 8 + r.len()).sum();
        let file_len = 100 + body_len;

        let mut out = Vec::with_capacity(file_len);
        out.extend_from_slice(&SHP_FILE_CODE.to_be_bytes());
        out.extend_from_slice(&[0u8; 20]);
        out.extend_from_slice(&((file_len / 2) as i32).to_be_bytes());
        out.extend_from_slice(&SHP_VERSION.to_le_bytes());
        out.extend_from_slice(&self.shape_type.to_le_bytes());
        push_bbox(&mut out, &self.xy);
        // z and m ranges
        out.extend_from_slice(&[0u8; 32]);

        for (i, content) in self.records.iter().enumerate() {
            out.extend_from_slice(&((i + 1) as i32).to_be_bytes());
            out.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
            out.extend_from_slice(content);
        }
        Bytes::from(out)
    }
}

fn push_bbox(out: &mut Vec<u8>, points: &[[f64; 2]]) {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    if let Some(first) = points.first() {
        (min_x, min_y, max_x, max_y) = (first[0], first[1], first[0], first[1]);
        for p in points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
    }
    for v in [min_x, min_y, max_x, max_y] {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

#[derive(Debug, Clone)]
struct DbfFieldSpec {
    name: String,
    field_type: u8,
    length: u8,
    decimals: u8,
}

/// Builds a dBASE III `.dbf` buffer.
#[derive(Debug, Clone, Default)]
pub struct DbfBuilder {
    fields: Vec<DbfFieldSpec>,
    records: Vec<(bool, Vec<String>)>,
}

impl DbfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(mut self, name: &str, field_type: u8, length: u8, decimals: u8) -> Self {
        self.fields.push(DbfFieldSpec {
            name: name.to_string(),
            field_type,
            length,
            decimals,
        });
        self
    }

    /// Character field.
    pub fn character(self, name: &str, length: u8) -> Self {
        self.field(name, b'C', length, 0)
    }

    /// Numeric field with the given number of decimals.
    pub fn numeric(self, name: &str, length: u8, decimals: u8) -> Self {
        self.field(name, b'N', length, decimals)
    }

    /// Logical field.
    pub fn logical(self, name: &str) -> Self {
        self.field(name, b'L', 1, 0)
    }

    /// Date field (YYYYMMDD).
    pub fn date(self, name: &str) -> Self {
        self.field(name, b'D', 8, 0)
    }

    /// Binary 32-bit integer field.
    pub fn integer(self, name: &str) -> Self {
        self.field(name, b'I', 4, 0)
    }

    /// Append a record; values are given as text in field order.
    pub fn record(mut self, values: &[&str]) -> Self {
        self.records
            .push((false, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    /// Append a record flagged as deleted.
    pub fn deleted_record(mut self, values: &[&str]) -> Self {
        self.records
            .push((true, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    pub fn build(&self) -> Bytes {
        let header_len = 32 + 32 * self.fields.len() + 1;
        let record_len = 1 + self.fields.iter().map(|f| f.length as usize).sum::<usize>();

        let mut out = Vec::new();
        out.push(0x03);
        out.extend_from_slice(&[124, 1, 15]);
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(&(record_len as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 20]);

        for field in &self.fields {
            let mut name = [0u8; 11];
            for (slot, b) in name.iter_mut().zip(field.name.bytes().take(10)) {
                *slot = b;
            }
            out.extend_from_slice(&name);
            out.push(field.field_type);
            out.extend_from_slice(&[0u8; 4]);
            out.push(field.length);
            out.push(field.decimals);
            out.extend_from_slice(&[0u8; 14]);
        }
        out.push(0x0D);

        for (deleted, values) in &self.records {
            out.push(if *deleted { b'*' } else { b' ' });
            for (field, value) in self.fields.iter().zip(values) {
                out.extend_from_slice(&encode_value(field, value));
            }
        }
        out.push(0x1A);
        Bytes::from(out)
    }
}

fn encode_value(field: &DbfFieldSpec, value: &str) -> Vec<u8> {
    let len = field.length as usize;
    if field.field_type == b'I' {
        return value.parse::<i32>().unwrap_or(0).to_le_bytes().to_vec();
    }

    let bytes: Vec<u8> = value.bytes().take(len).collect();
    let pad = len - bytes.len();
    if matches!(field.field_type, b'N' | b'F') {
        let mut out = vec![b' '; pad];
        out.extend(bytes);
        out
    } else {
        let mut out = bytes;
        out.extend(std::iter::repeat(b' ').take(pad));
        out
    }
}
