//! Well-Known Text reader and writer.
//!
//! Reads what PostGIS `ST_AsText` produces for the geometry types in
//! [`Geometry`], plus the `SRID=n;` prefix of EWKT. Writes WKT accepted by
//! `ST_GeogFromText`.

use std::fmt::Write as _;

use thiserror::Error;

use crate::geojson::{Geometry, Position, Ring};

#[derive(Debug, Error, PartialEq)]
pub enum WktError {
    #[error("Unexpected end of WKT input")]
    UnexpectedEnd,

    #[error("Expected '{expected}' at offset {offset}")]
    Expected { expected: char, offset: usize },

    #[error("Invalid number at offset {0}")]
    InvalidNumber(usize),

    #[error("Unsupported geometry type: {0}")]
    UnsupportedType(String),

    #[error("Empty geometries are not supported")]
    Empty,

    #[error("Trailing characters at offset {0}")]
    TrailingInput(usize),
}

/// Parse a WKT (or EWKT) string into a geometry.
pub fn parse_wkt(input: &str) -> Result<Geometry, WktError> {
    let trimmed = input.trim_start();
    let body = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("SRID=") => trimmed[5..]
            .split_once(';')
            .map(|(_, wkt)| wkt)
            .ok_or(WktError::UnexpectedEnd)?,
        _ => input,
    };

    let mut parser = Parser::new(body);
    let geometry = parser.geometry()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
        return Err(WktError::TrailingInput(parser.pos));
    }
    Ok(geometry)
}

/// Render a geometry as WKT.
pub fn to_wkt(geometry: &Geometry) -> String {
    let mut out = String::new();
    match geometry {
        Geometry::Point { coordinates } => {
            out.push_str("POINT(");
            write_position(&mut out, coordinates);
            out.push(')');
        }
        Geometry::MultiPoint { coordinates } => {
            out.push_str("MULTIPOINT");
            write_sequence(&mut out, coordinates);
        }
        Geometry::LineString { coordinates } => {
            out.push_str("LINESTRING");
            write_sequence(&mut out, coordinates);
        }
        Geometry::MultiLineString { coordinates } => {
            out.push_str("MULTILINESTRING");
            write_rings(&mut out, coordinates);
        }
        Geometry::Polygon { coordinates } => {
            out.push_str("POLYGON");
            write_rings(&mut out, coordinates);
        }
        Geometry::MultiPolygon { coordinates } => {
            out.push_str("MULTIPOLYGON(");
            for (i, polygon) in coordinates.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_rings(&mut out, polygon);
            }
            out.push(')');
        }
    }
    out
}

fn write_position(out: &mut String, position: &Position) {
    let _ = write!(out, "{} {}", position[0], position[1]);
}

fn write_sequence(out: &mut String, positions: &[Position]) {
    out.push('(');
    for (i, position) in positions.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_position(out, position);
    }
    out.push(')');
}

fn write_rings(out: &mut String, rings: &[Ring]) {
    out.push('(');
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_sequence(out, ring);
    }
    out.push(')');
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.src[self.pos..].chars().next()
    }

    fn expect(&mut self, expected: char) -> Result<(), WktError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(_) => Err(WktError::Expected {
                expected,
                offset: self.pos,
            }),
            None => Err(WktError::UnexpectedEnd),
        }
    }

    /// Consume `c` if it is the next significant character.
    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn word(&mut self) -> String {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        self.pos += len;
        rest[..len].to_ascii_uppercase()
    }

    fn number(&mut self) -> Result<f64, WktError> {
        self.skip_ws();
        let start = self.pos;
        let rest = &self.src[start..];
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
            .unwrap_or(rest.len());
        if len == 0 {
            return if rest.is_empty() {
                Err(WktError::UnexpectedEnd)
            } else {
                Err(WktError::InvalidNumber(start))
            };
        }
        self.pos += len;
        rest[..len]
            .parse()
            .map_err(|_| WktError::InvalidNumber(start))
    }

    fn at_number(&mut self) -> bool {
        matches!(self.peek(), Some(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    }

    fn geometry(&mut self) -> Result<Geometry, WktError> {
        let tag = self.word();
        if tag.is_empty() {
            return match self.peek() {
                Some(_) => Err(WktError::UnsupportedType(self.src[self.pos..].to_string())),
                None => Err(WktError::UnexpectedEnd),
            };
        }

        // Dimension markers (POINT Z, POINT ZM, ...) and EMPTY
        let mut modifier = self.word();
        if matches!(modifier.as_str(), "Z" | "M" | "ZM") {
            modifier = self.word();
        }
        if modifier == "EMPTY" {
            return Err(WktError::Empty);
        }

        match tag.as_str() {
            "POINT" => {
                self.expect('(')?;
                let coordinates = self.position()?;
                self.expect(')')?;
                Ok(Geometry::Point { coordinates })
            }
            "MULTIPOINT" => Ok(Geometry::MultiPoint {
                coordinates: self.multi_point()?,
            }),
            "LINESTRING" => Ok(Geometry::LineString {
                coordinates: self.sequence()?,
            }),
            "MULTILINESTRING" => Ok(Geometry::MultiLineString {
                coordinates: self.sequences()?,
            }),
            "POLYGON" => Ok(Geometry::Polygon {
                coordinates: self.sequences()?,
            }),
            "MULTIPOLYGON" => {
                self.expect('(')?;
                let mut polygons = vec![self.sequences()?];
                while self.eat(',') {
                    polygons.push(self.sequences()?);
                }
                self.expect(')')?;
                Ok(Geometry::MultiPolygon {
                    coordinates: polygons,
                })
            }
            other => Err(WktError::UnsupportedType(other.to_string())),
        }
    }

    /// `x y [z [m]]`; extra ordinates are dropped.
    fn position(&mut self) -> Result<Position, WktError> {
        let x = self.number()?;
        let y = self.number()?;
        while self.at_number() {
            self.number()?;
        }
        Ok([x, y])
    }

    fn sequence(&mut self) -> Result<Vec<Position>, WktError> {
        self.expect('(')?;
        let mut positions = vec![self.position()?];
        while self.eat(',') {
            positions.push(self.position()?);
        }
        self.expect(')')?;
        Ok(positions)
    }

    fn sequences(&mut self) -> Result<Vec<Vec<Position>>, WktError> {
        self.expect('(')?;
        let mut sequences = vec![self.sequence()?];
        while self.eat(',') {
            sequences.push(self.sequence()?);
        }
        self.expect(')')?;
        Ok(sequences)
    }

    /// Both `MULTIPOINT(1 2, 3 4)` and `MULTIPOINT((1 2), (3 4))`.
    fn multi_point(&mut self) -> Result<Vec<Position>, WktError> {
        self.expect('(')?;
        let mut positions = Vec::new();
        loop {
            if self.eat('(') {
                positions.push(self.position()?);
                self.expect(')')?;
            } else {
                positions.push(self.position()?);
            }
            if !self.eat(',') {
                break;
            }
        }
        self.expect(')')?;
        Ok(positions)
    }
}
