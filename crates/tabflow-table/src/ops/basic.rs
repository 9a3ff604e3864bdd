//! Row slicing and column-level operators.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tabflow_common::{AppError, Cell};

use crate::table::{ColumnType, Table};

use super::compare_cells;

/// Half-open row range `[start, end)`; `end` defaults to the row count.
/// Out-of-range bounds clamp rather than fail.
pub fn slice(table: &Table, start: usize, end: Option<usize>) -> Table {
    let end = end.unwrap_or(table.row_count()).min(table.row_count());
    let start = start.min(end);
    table.derive_rows(table.rows()[start..end].to_vec())
}

/// Rename columns via an old→new map. Names not present are ignored; a
/// resulting duplicate fails with `DuplicateColumn`.
pub fn rename_columns(table: &Table, renames: &FxHashMap<String, String>) -> Result<Table, AppError> {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| renames.get(c).cloned().unwrap_or_else(|| c.clone()))
        .collect();

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for name in &columns {
        if !seen.insert(name.as_str()) {
            return Err(AppError::duplicate_column(name));
        }
    }

    Ok(table.derive(columns, table.rows().to_vec()))
}

/// Append (or insert at `index`) a computed column.
///
/// The value function receives each row and its index; an error from it
/// aborts the whole derivation.
pub fn add_column<F>(
    table: &Table,
    name: &str,
    index: Option<usize>,
    mut value_fn: F,
) -> Result<Table, AppError>
where
    F: FnMut(&[Cell], usize) -> Result<Cell, AppError>,
{
    if table.has_column(name) {
        return Err(AppError::duplicate_column(name));
    }
    let at = index.unwrap_or(table.column_count()).min(table.column_count());

    let mut columns = table.columns().to_vec();
    columns.insert(at, name.to_string());

    let mut rows = Vec::with_capacity(table.row_count());
    for (i, row) in table.rows().iter().enumerate() {
        let value = value_fn(row, i)?;
        let mut new_row = row.clone();
        new_row.insert(at, value);
        rows.push(new_row);
    }

    Ok(table.derive(columns, rows))
}

/// Drop the named columns; unknown names are ignored.
pub fn remove_columns(table: &Table, names: &[String]) -> Table {
    let drop: FxHashSet<&str> = names.iter().map(|s| s.as_str()).collect();
    let keep: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !drop.contains(c.as_str()))
        .map(|(i, _)| i)
        .collect();

    let columns = keep.iter().map(|&i| table.columns()[i].clone()).collect();
    let rows = table
        .rows()
        .iter()
        .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
        .collect();
    table.derive(columns, rows)
}

/// Distinct values of a column in first-seen order.
pub fn unique_values(table: &Table, column: &str) -> Result<Vec<Cell>, AppError> {
    let index = table.column_index(column)?;
    let mut seen: FxHashSet<&Cell> = FxHashSet::default();
    let mut out = Vec::new();
    for cell in table.column_cells(index) {
        if seen.insert(cell) {
            out.push(cell.clone());
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    pub count: usize,
    pub null_count: usize,
    pub unique_count: usize,
    pub min: Cell,
    pub max: Cell,
    /// Mean over numeric cells; null when the column has none.
    pub avg: Cell,
    /// Sum over numeric cells; null when the column has none.
    pub sum: Cell,
}

/// Summary statistics for one column. Numeric stats cover `Number` cells
/// only; min/max fall back to type-aware ordering for non-numeric columns.
pub fn column_stats(table: &Table, column: &str) -> Result<ColumnStats, AppError> {
    let index = table.column_index(column)?;
    let ty = table.column_type(column).unwrap_or(ColumnType::Text);

    let mut null_count = 0;
    let mut uniques: FxHashSet<&Cell> = FxHashSet::default();
    let mut min: Option<&Cell> = None;
    let mut max: Option<&Cell> = None;
    let mut sum = 0.0;
    let mut numeric_count = 0usize;

    for cell in table.column_cells(index) {
        if cell.is_null() {
            null_count += 1;
            continue;
        }
        uniques.insert(cell);
        if let Some(n) = cell.as_number() {
            sum += n;
            numeric_count += 1;
        }
        min = Some(match min {
            Some(m) if compare_cells(m, cell, ty).is_le() => m,
            _ => cell,
        });
        max = Some(match max {
            Some(m) if compare_cells(m, cell, ty).is_ge() => m,
            _ => cell,
        });
    }

    Ok(ColumnStats {
        count: table.row_count(),
        null_count,
        unique_count: uniques.len(),
        min: min.cloned().unwrap_or(Cell::Null),
        max: max.cloned().unwrap_or(Cell::Null),
        avg: if numeric_count == 0 {
            Cell::Null
        } else {
            Cell::Number(sum / numeric_count as f64)
        },
        sum: if numeric_count == 0 {
            Cell::Null
        } else {
            Cell::Number(sum)
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(
            vec!["name".into(), "v".into()],
            vec![
                vec!["a".into(), 1.into()],
                vec!["b".into(), 2.into()],
                vec!["a".into(), Cell::Null],
                vec!["c".into(), 4.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn slice_half_open_and_clamped() {
        assert_eq!(slice(&table(), 1, Some(3)).row_count(), 2);
        assert_eq!(slice(&table(), 0, None).row_count(), 4);
        assert_eq!(slice(&table(), 2, Some(100)).row_count(), 2);
        assert_eq!(slice(&table(), 10, None).row_count(), 0);
    }

    #[test]
    fn rename_detects_duplicates() {
        let mut renames = FxHashMap::default();
        renames.insert("v".to_string(), "name".to_string());
        let err = rename_columns(&table(), &renames).unwrap_err();
        assert!(err.has_code(tabflow_common::codes::DUPLICATE_COLUMN));

        let mut ok = FxHashMap::default();
        ok.insert("v".to_string(), "value".to_string());
        let out = rename_columns(&table(), &ok).unwrap();
        assert_eq!(out.columns()[1], "value");
    }

    #[test]
    fn add_column_at_index() {
        let out = add_column(&table(), "idx", Some(0), |_, i| Ok(Cell::Number(i as f64)))
            .unwrap();
        assert_eq!(out.columns()[0], "idx");
        assert_eq!(out.rows()[3][0], Cell::Number(3.0));
    }

    #[test]
    fn add_column_rejects_existing_name() {
        let err = add_column(&table(), "v", None, |_, _| Ok(Cell::Null)).unwrap_err();
        assert!(err.has_code(tabflow_common::codes::DUPLICATE_COLUMN));
    }

    #[test]
    fn add_column_propagates_errors() {
        let err = add_column(&table(), "x", None, |_, i| {
            if i == 2 {
                Err(AppError::execution("boom"))
            } else {
                Ok(Cell::Null)
            }
        })
        .unwrap_err();
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn remove_ignores_unknown() {
        let out = remove_columns(&table(), &["v".into(), "ghost".into()]);
        assert_eq!(out.columns(), &["name".to_string()]);
        assert_eq!(out.row_count(), 4);
    }

    #[test]
    fn unique_values_first_seen_order() {
        let values = unique_values(&table(), "name").unwrap();
        assert_eq!(values, vec!["a".into(), "b".into(), "c".into()]);
    }

    #[test]
    fn stats_over_numeric_column() {
        let stats = column_stats(&table(), "v").unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.unique_count, 3);
        assert_eq!(stats.min, Cell::Number(1.0));
        assert_eq!(stats.max, Cell::Number(4.0));
        assert_eq!(stats.sum, Cell::Number(7.0));
        assert_eq!(stats.avg, Cell::Number(7.0 / 3.0));
    }

    #[test]
    fn stats_over_text_column_uses_ordering() {
        let stats = column_stats(&table(), "name").unwrap();
        assert_eq!(stats.min, "a".into());
        assert_eq!(stats.max, "c".into());
        assert_eq!(stats.avg, Cell::Null);
    }
}
