//! Pattern-based column type inference.
//!
//! The rules follow a fixed precedence over non-null values:
//! timestamp (any value is a timestamp or matches a date pattern) →
//! number (every value numeric or parsing as a finite number) →
//! boolean (every value a bool or "true"/"false") → text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use tabflow_common::{Cell, parse_timestamp};

use crate::table::ColumnType;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]{6,18}[0-9]$").unwrap());
static CURRENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[$€£¥]\s?-?[0-9][0-9,]*(\.[0-9]+)?$").unwrap());

/// A recognized value pattern within a text column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuePattern {
    Email,
    Url,
    Phone,
    Currency,
}

impl ValuePattern {
    fn matches(&self, s: &str) -> bool {
        match self {
            ValuePattern::Email => EMAIL_RE.is_match(s),
            ValuePattern::Url => URL_RE.is_match(s),
            ValuePattern::Phone => PHONE_RE.is_match(s),
            ValuePattern::Currency => CURRENCY_RE.is_match(s),
        }
    }

    const ALL: [ValuePattern; 4] = [
        ValuePattern::Email,
        ValuePattern::Url,
        ValuePattern::Phone,
        ValuePattern::Currency,
    ];
}

/// Result of the enhanced inference step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInference {
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub pattern: Option<ValuePattern>,
    /// Largest matched pattern fraction, or 0.5 when no pattern matches.
    pub confidence: f64,
}

/// Infer the type of a column from its cells.
pub fn infer_column_type(cells: &[&Cell]) -> ColumnType {
    let non_null: Vec<&Cell> = cells.iter().copied().filter(|c| !c.is_null()).collect();
    if non_null.is_empty() {
        return ColumnType::Unknown;
    }

    // Timestamp wins if *any* value is one. The asymmetry is intentional: a
    // single recognizable date in a column is a stronger signal than mixed
    // text is a counter-signal.
    let any_timestamp = non_null.iter().any(|c| match c {
        Cell::Timestamp(_) => true,
        Cell::Text(s) => parse_timestamp(s).is_some(),
        _ => false,
    });
    if any_timestamp {
        return ColumnType::Timestamp;
    }

    let all_numeric = non_null.iter().all(|c| match c {
        Cell::Number(_) => true,
        Cell::Text(s) => s.trim().parse::<f64>().map(|n| n.is_finite()).unwrap_or(false),
        _ => false,
    });
    if all_numeric {
        return ColumnType::Number;
    }

    let all_boolean = non_null.iter().all(|c| match c {
        Cell::Bool(_) => true,
        Cell::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "false"),
        _ => false,
    });
    if all_boolean {
        return ColumnType::Boolean;
    }

    ColumnType::Text
}

/// Enhanced inference: the base type plus the dominant text pattern and a
/// confidence equal to the largest matched fraction (0.5 if none match).
pub fn infer_column(cells: &[&Cell]) -> TypeInference {
    let ty = infer_column_type(cells);

    let texts: Vec<&str> = cells
        .iter()
        .filter_map(|c| match c {
            Cell::Text(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        })
        .collect();

    if texts.is_empty() {
        return TypeInference {
            ty,
            pattern: None,
            confidence: 0.5,
        };
    }

    let mut best: Option<(ValuePattern, f64)> = None;
    for pattern in ValuePattern::ALL {
        let matched = texts.iter().filter(|s| pattern.matches(s)).count();
        let fraction = matched as f64 / texts.len() as f64;
        if fraction > 0.0 && best.map_or(true, |(_, f)| fraction > f) {
            best = Some((pattern, fraction));
        }
    }

    match best {
        Some((pattern, fraction)) => TypeInference {
            ty,
            pattern: Some(pattern),
            confidence: fraction,
        },
        None => TypeInference {
            ty,
            pattern: None,
            confidence: 0.5,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Cell]) -> Vec<&Cell> {
        values.iter().collect()
    }

    #[test]
    fn numeric_text_is_number() {
        let v = vec![Cell::Text("1".into()), Cell::Text("2.5".into()), Cell::Null];
        assert_eq!(infer_column_type(&cells(&v)), ColumnType::Number);
    }

    #[test]
    fn single_date_makes_timestamp() {
        let v = vec![
            Cell::Text("hello".into()),
            Cell::Text("2024-01-15".into()),
        ];
        assert_eq!(infer_column_type(&cells(&v)), ColumnType::Timestamp);
    }

    #[test]
    fn boolean_strings() {
        let v = vec![Cell::Text("TRUE".into()), Cell::Bool(false)];
        assert_eq!(infer_column_type(&cells(&v)), ColumnType::Boolean);
    }

    #[test]
    fn mixed_falls_back_to_text() {
        let v = vec![Cell::Text("abc".into()), Cell::Number(1.0)];
        assert_eq!(infer_column_type(&cells(&v)), ColumnType::Text);
    }

    #[test]
    fn all_null_is_unknown() {
        let v = vec![Cell::Null, Cell::Null];
        assert_eq!(infer_column_type(&cells(&v)), ColumnType::Unknown);
    }

    #[test]
    fn email_pattern_dominates() {
        let v = vec![
            Cell::Text("a@example.com".into()),
            Cell::Text("b@example.org".into()),
            Cell::Text("not-an-email".into()),
        ];
        let inf = infer_column(&cells(&v));
        assert_eq!(inf.pattern, Some(ValuePattern::Email));
        assert!((inf.confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn no_pattern_yields_half_confidence() {
        let v = vec![Cell::Text("plain".into()), Cell::Text("words".into())];
        let inf = infer_column(&cells(&v));
        assert_eq!(inf.pattern, None);
        assert_eq!(inf.confidence, 0.5);
    }

    #[test]
    fn currency_and_url_patterns() {
        assert!(ValuePattern::Currency.matches("$1,200.50"));
        assert!(ValuePattern::Currency.matches("€ 99"));
        assert!(!ValuePattern::Currency.matches("1200"));
        assert!(ValuePattern::Url.matches("https://example.com/x?y=1"));
        assert!(!ValuePattern::Url.matches("example.com"));
        assert!(ValuePattern::Phone.matches("+1 (555) 123-4567"));
    }
}
