use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tabflow_common::{AppError, Cell};

use crate::infer::infer_column_type;

/// Per-column inferred type.
///
/// `Mixed` marks columns whose non-null values disagree; `Unknown` marks
/// columns with no non-null observations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Text,
    Boolean,
    Timestamp,
    Mixed,
    Unknown,
}

/// Where a table came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableOrigin {
    Paste,
    File,
    Http,
    Example,
    Derived,
}

/// Transport-level details attached by ingestion (HTTP url/status/timing,
/// file path, …).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
}

/// Table metadata, recomputed on every derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    pub row_count: usize,
    pub column_count: usize,
    /// Inferred type per column name.
    pub types: FxHashMap<String, ColumnType>,
    /// True iff any null was observed in the column.
    pub nullable: FxHashMap<String, bool>,
    /// True iff all observed values in the column are distinct.
    pub unique: FxHashMap<String, bool>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub origin: Option<TableOrigin>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<SourceInfo>,
}

/// An ordered, in-memory table.
///
/// Invariants (enforced by constructors, rechecked by [`Table::validate`]):
/// column names are unique and non-empty, every row has exactly
/// `columns.len()` cells, and `meta` counts match the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    pub meta: TableMeta,
}

impl Table {
    /// Build a table from row-major data, inferring metadata.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, AppError> {
        check_columns(&columns)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(AppError::data(format!(
                    "Row {i} has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
        }
        let meta = compute_meta(&columns, &rows, None, None);
        Ok(Self { columns, rows, meta })
    }

    /// Build from an ordered sequence of name→value records. Column order is
    /// the union of keys in first-seen order; missing keys become nulls.
    pub fn from_records<I>(records: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = Vec<(String, Cell)>>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut raw: Vec<Vec<(String, Cell)>> = Vec::new();

        for record in records {
            for (key, _) in &record {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
            raw.push(record);
        }

        let index: FxHashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let rows = raw
            .into_iter()
            .map(|record| {
                let mut row = vec![Cell::Null; columns.len()];
                for (key, value) in record {
                    if let Some(&i) = index.get(key.as_str()) {
                        row[i] = value;
                    }
                }
                row
            })
            .collect();

        Table::new(columns, rows)
    }

    /// Empty table with no columns.
    pub fn empty() -> Self {
        Table::new(Vec::new(), Vec::new()).unwrap()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Positional index of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize, AppError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AppError::unknown_column(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Iterate the cells of one column, in row order.
    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| &row[index])
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Inferred type of a named column, if present.
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.meta.types.get(name).copied()
    }

    /// Derive a new table from this one: metadata is recomputed, the origin
    /// is carried over, and the modified timestamp is refreshed.
    pub fn derive(&self, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Table {
        let meta = compute_meta(&columns, &rows, self.meta.origin, Some(self.meta.created_at));
        Table { columns, rows, meta }
    }

    /// Derive keeping the same column list.
    pub fn derive_rows(&self, rows: Vec<Vec<Cell>>) -> Table {
        self.derive(self.columns.clone(), rows)
    }

    pub fn with_origin(mut self, origin: TableOrigin) -> Self {
        self.meta.origin = Some(origin);
        self
    }

    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.meta.source = Some(source);
        self
    }

    /// Rough in-memory footprint in bytes.
    pub fn estimated_bytes(&self) -> usize {
        let cells: usize = self
            .rows
            .iter()
            .flat_map(|r| r.iter())
            .map(Cell::estimated_bytes)
            .sum();
        let header: usize = self.columns.iter().map(|c| 24 + c.len()).sum();
        cells + header
    }

    /// Recheck the structural invariants. Used by tests and by the engine's
    /// debug assertions.
    pub fn validate(&self) -> Result<(), AppError> {
        check_columns(&self.columns)?;
        if self.meta.row_count != self.rows.len() {
            return Err(AppError::data("Metadata row count out of sync"));
        }
        if self.meta.column_count != self.columns.len() {
            return Err(AppError::data("Metadata column count out of sync"));
        }
        if self.meta.types.len() != self.columns.len() {
            return Err(AppError::data("Metadata type map out of sync"));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(AppError::data(format!("Row {i} width mismatch")));
            }
        }
        Ok(())
    }
}

fn check_columns(columns: &[String]) -> Result<(), AppError> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for name in columns {
        if name.is_empty() {
            return Err(AppError::data("Column names must be non-empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(AppError::duplicate_column(name));
        }
    }
    Ok(())
}

fn compute_meta(
    columns: &[String],
    rows: &[Vec<Cell>],
    origin: Option<TableOrigin>,
    created_at: Option<DateTime<Utc>>,
) -> TableMeta {
    let now = Utc::now();
    let mut types = FxHashMap::default();
    let mut nullable = FxHashMap::default();
    let mut unique = FxHashMap::default();

    for (i, name) in columns.iter().enumerate() {
        let cells: Vec<&Cell> = rows.iter().map(|r| &r[i]).collect();
        types.insert(name.clone(), infer_column_type(&cells));
        nullable.insert(name.clone(), cells.iter().any(|c| c.is_null()));

        let mut seen: FxHashSet<&Cell> = FxHashSet::default();
        let mut all_distinct = true;
        for cell in &cells {
            if !seen.insert(*cell) {
                all_distinct = false;
                break;
            }
        }
        unique.insert(name.clone(), all_distinct);
    }

    TableMeta {
        row_count: rows.len(),
        column_count: columns.len(),
        types,
        nullable,
        unique,
        created_at: created_at.unwrap_or(now),
        modified_at: now,
        origin,
        source: None,
    }
}
