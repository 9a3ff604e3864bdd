use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A single table cell.
///
/// Every value that flows through an operator is one of these variants.
/// `Number` is always a 64-bit float; integer-looking inputs are widened on
/// ingestion. `Timestamp` is a naive (zoneless) instant — tables carry no
/// timezone information.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Cell::Null => state.write_u8(0),
            Cell::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Cell::Number(n) => {
                state.write_u8(2);
                n.to_bits().hash(state);
            }
            Cell::Text(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Cell::Timestamp(t) => {
                state.write_u8(4);
                t.hash(state);
            }
            Cell::Blob(b) => {
                state.write_u8(5);
                b.hash(state);
            }
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, ""),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Number(n) => {
                // Whole numbers render without a trailing ".0" so CSV/JSON
                // exports match what a user typed in.
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%S")),
            Cell::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Strict numeric view: only `Number` cells qualify.
    ///
    /// Aggregations (sum/avg/min/max) use this — text that happens to look
    /// numeric is ignored by design.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Lenient numeric view used by comparisons and normalization: numbers,
    /// booleans (0/1), and numeric-looking text all coerce.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// Timestamp view: `Timestamp` cells directly, text via the recognized
    /// date patterns.
    pub fn coerce_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(t) => Some(*t),
            Cell::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    pub fn coerce_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            Cell::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Cell::Null => false,
            Cell::Bool(b) => *b,
            Cell::Number(n) => *n != 0.0,
            Cell::Text(s) => !s.is_empty(),
            Cell::Timestamp(_) => true,
            Cell::Blob(b) => !b.is_empty(),
        }
    }

    /// String form used by the case-insensitive text operators.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Rough in-memory footprint, used by the profiler's byte estimate.
    pub fn estimated_bytes(&self) -> usize {
        match self {
            Cell::Null => 8,
            Cell::Bool(_) => 8,
            Cell::Number(_) => 8,
            Cell::Text(s) => 24 + s.len(),
            Cell::Timestamp(_) => 12,
            Cell::Blob(b) => 24 + b.len(),
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}
impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n as f64)
    }
}
impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}
impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}
impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}
impl From<NaiveDateTime> for Cell {
    fn from(t: NaiveDateTime) -> Self {
        Cell::Timestamp(t)
    }
}
impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Cell::Null,
        }
    }
}

impl From<&serde_json::Value> for Cell {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Cell::Text(s.clone()),
            // Nested structures flatten to their JSON text form; tables are
            // strictly two-dimensional.
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&Cell> for serde_json::Value {
    fn from(c: &Cell) -> Self {
        use serde_json::Value;
        match c {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Timestamp(t) => Value::String(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Cell::Blob(b) => Value::Array(b.iter().map(|x| Value::Number((*x).into())).collect()),
        }
    }
}

/* ─────────────────────────── serde ─────────────────────────── */

// Cells serialize to the natural JSON scalar so array-of-objects exports
// contain plain values, not enum wrappers. Timestamps round-trip as ISO
// strings (they come back as Text; column inference re-types them).
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_unit(),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Number(n) => serializer.serialize_f64(*n),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Timestamp(t) => {
                serializer.serialize_str(&t.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Cell::Blob(b) => {
                let mut seq = serializer.serialize_seq(Some(b.len()))?;
                for byte in b {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CellVisitor;

        impl<'de> Visitor<'de> for CellVisitor {
            type Value = Cell;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON scalar or byte array")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Cell, E> {
                Ok(Cell::Null)
            }
            fn visit_none<E: de::Error>(self) -> Result<Cell, E> {
                Ok(Cell::Null)
            }
            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Cell, D::Error> {
                Cell::deserialize(d)
            }
            fn visit_bool<E: de::Error>(self, b: bool) -> Result<Cell, E> {
                Ok(Cell::Bool(b))
            }
            fn visit_i64<E: de::Error>(self, n: i64) -> Result<Cell, E> {
                Ok(Cell::Number(n as f64))
            }
            fn visit_u64<E: de::Error>(self, n: u64) -> Result<Cell, E> {
                Ok(Cell::Number(n as f64))
            }
            fn visit_f64<E: de::Error>(self, n: f64) -> Result<Cell, E> {
                Ok(Cell::Number(n))
            }
            fn visit_str<E: de::Error>(self, s: &str) -> Result<Cell, E> {
                Ok(Cell::Text(s.to_string()))
            }
            fn visit_string<E: de::Error>(self, s: String) -> Result<Cell, E> {
                Ok(Cell::Text(s))
            }
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Cell, A::Error> {
                let mut bytes = Vec::new();
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                Ok(Cell::Blob(bytes))
            }
        }

        deserializer.deserialize_any(CellVisitor)
    }
}

/* ──────────────────── timestamp parsing ──────────────────── */

/// Parse text into a timestamp using the fixed pattern set:
/// ISO `YYYY-MM-DD` (with optional `THH:MM[:SS]`), US `M/D/YYYY`, and
/// European `D.M.YYYY`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }

    let date = parse_date(s)?;
    Some(date.and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap()))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    // ISO: 2024-03-01
    if let Some((y, m, d)) = split_date(s, '-') {
        if s.len() >= 8 && s.chars().take(4).all(|c| c.is_ascii_digit()) {
            return NaiveDate::from_ymd_opt(y, m as u32, d as u32);
        }
    }
    // US: 3/1/2024
    if let Some((m, d, y)) = split_date(s, '/') {
        return NaiveDate::from_ymd_opt(y, m as u32, d as u32);
    }
    // European: 1.3.2024
    if let Some((d, m, y)) = split_date(s, '.') {
        return NaiveDate::from_ymd_opt(y, m as u32, d as u32);
    }
    None
}

/// Split `a<sep>b<sep>c` into three integers, yielding them in input order
/// except that a four-digit trailing part is recognized as the year.
fn split_date(s: &str, sep: char) -> Option<(i32, i32, i32)> {
    let parts: Vec<&str> = s.split(sep).collect();
    if parts.len() != 3 {
        return None;
    }
    let a = parts[0].parse::<i32>().ok()?;
    let b = parts[1].parse::<i32>().ok()?;
    let c = parts[2].parse::<i32>().ok()?;
    if sep == '-' {
        // year leads
        Some((a, b, c))
    } else {
        // year trails; reject obviously non-date triples
        if parts[2].len() != 4 {
            return None;
        }
        Some((a, b, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_display_drops_trailing_zero() {
        assert_eq!(Cell::Number(75000.0).to_string(), "75000");
        assert_eq!(Cell::Number(0.5).to_string(), "0.5");
    }

    #[test]
    fn coerce_number_accepts_numeric_text() {
        assert_eq!(Cell::Text("42".into()).coerce_number(), Some(42.0));
        assert_eq!(Cell::Text(" 3.5 ".into()).coerce_number(), Some(3.5));
        assert_eq!(Cell::Text("abc".into()).coerce_number(), None);
        assert_eq!(Cell::Null.coerce_number(), None);
    }

    #[test]
    fn strict_number_ignores_text() {
        assert_eq!(Cell::Text("42".into()).as_number(), None);
        assert_eq!(Cell::Number(1.5).as_number(), Some(1.5));
    }

    #[test]
    fn timestamp_patterns() {
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("3/1/2024").is_some());
        assert!(parse_timestamp("1.3.2024").is_some());
        assert!(parse_timestamp("2024-03-01T10:30:00").is_some());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("1.2.3").is_none());
    }

    #[test]
    fn us_and_european_order_differ() {
        let us = parse_timestamp("3/1/2024").unwrap();
        let eu = parse_timestamp("3.1.2024").unwrap();
        assert_eq!(us.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(eu.date(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn serde_scalar_round_trip() {
        let cells = vec![
            Cell::Null,
            Cell::Bool(true),
            Cell::Number(2.5),
            Cell::Text("hi".into()),
        ];
        let json = serde_json::to_string(&cells).unwrap();
        let back: Vec<Cell> = serde_json::from_str(&json).unwrap();
        assert_eq!(cells, back);
    }

    #[test]
    fn hash_distinguishes_variants() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Cell::Number(1.0));
        set.insert(Cell::Text("1".into()));
        set.insert(Cell::Bool(true));
        set.insert(Cell::Null);
        assert_eq!(set.len(), 4);
    }
}
