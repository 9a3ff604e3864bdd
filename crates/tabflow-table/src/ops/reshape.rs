//! Pivot, unpivot, and transpose.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use tabflow_common::{AppError, Cell};

use crate::table::Table;

use super::group::{AggFn, AggState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotConfig {
    /// Column whose distinct values become output rows.
    pub index_column: String,
    /// Column whose distinct values become output columns.
    pub column_column: String,
    /// Column supplying the cell values.
    pub value_column: String,
    /// Applied when several input rows land in one output cell.
    #[serde(default = "default_pivot_agg")]
    pub aggregation: AggFn,
}

fn default_pivot_agg() -> AggFn {
    AggFn::First
}

/// Wide-format pivot. Output rows are the distinct index values in
/// first-seen order; output columns are the index column followed by the
/// distinct column-column values in first-seen order.
pub fn pivot(table: &Table, config: &PivotConfig) -> Result<Table, AppError> {
    let index_col = table.column_index(&config.index_column)?;
    let column_col = table.column_index(&config.column_column)?;
    let value_col = table.column_index(&config.value_column)?;

    let mut row_keys: Vec<Cell> = Vec::new();
    let mut row_of: FxHashMap<Cell, usize> = FxHashMap::default();
    let mut col_keys: Vec<String> = Vec::new();
    let mut col_of: FxHashMap<String, usize> = FxHashMap::default();
    let mut cells: FxHashMap<(usize, usize), AggState> = FxHashMap::default();

    for row in table.rows() {
        let rk = row[index_col].clone();
        let ri = *row_of.entry(rk.clone()).or_insert_with(|| {
            row_keys.push(rk);
            row_keys.len() - 1
        });

        let ck = row[column_col].to_text();
        let ci = *col_of.entry(ck.clone()).or_insert_with(|| {
            col_keys.push(ck);
            col_keys.len() - 1
        });

        cells
            .entry((ri, ci))
            .or_default()
            .push(Some(&row[value_col]));
    }

    let mut columns = vec![config.index_column.clone()];
    for key in &col_keys {
        let name = if key.is_empty() { "null".to_string() } else { key.clone() };
        // A column value may collide with the index column name; suffix it.
        if columns.contains(&name) {
            columns.push(format!("{name}_value"));
        } else {
            columns.push(name);
        }
    }

    let rows: Vec<Vec<Cell>> = row_keys
        .iter()
        .enumerate()
        .map(|(ri, rk)| {
            let mut row = Vec::with_capacity(columns.len());
            row.push(rk.clone());
            for ci in 0..col_keys.len() {
                row.push(
                    cells
                        .get(&(ri, ci))
                        .map(|state| state.finish(config.aggregation, true))
                        .unwrap_or(Cell::Null),
                );
            }
            row
        })
        .collect();

    Ok(table.derive(columns, rows))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpivotConfig {
    /// Columns kept as identifiers on every output row.
    pub id_columns: Vec<String>,
    /// Columns melted into (variable, value) pairs; defaults to every
    /// non-id column.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value_columns: Option<Vec<String>>,
}

/// Long-format unpivot: each value column contributes one output row per
/// input row, as `id_columns ++ [variable, value]`.
pub fn unpivot(table: &Table, config: &UnpivotConfig) -> Result<Table, AppError> {
    let id_indices: Vec<usize> = config
        .id_columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<_, _>>()?;

    let value_names: Vec<String> = match &config.value_columns {
        Some(names) => {
            for name in names {
                table.column_index(name)?;
            }
            names.clone()
        }
        None => table
            .columns()
            .iter()
            .filter(|c| !config.id_columns.contains(c))
            .cloned()
            .collect(),
    };
    let value_indices: Vec<usize> = value_names
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<_, _>>()?;

    let mut columns: Vec<String> = config.id_columns.clone();
    columns.push("variable".to_string());
    columns.push("value".to_string());

    let mut rows = Vec::with_capacity(table.row_count() * value_indices.len());
    for row in table.rows() {
        for (name, &index) in value_names.iter().zip(&value_indices) {
            let mut out: Vec<Cell> = id_indices.iter().map(|&i| row[i].clone()).collect();
            out.push(Cell::Text(name.clone()));
            out.push(row[index].clone());
            rows.push(out);
        }
    }

    Ok(table.derive(columns, rows))
}

/// Swap rows and columns. The first output column (`column`) holds the
/// original column names; data columns are `row_1..row_n`.
pub fn transpose(table: &Table) -> Table {
    let mut columns = vec!["column".to_string()];
    columns.extend((1..=table.row_count()).map(|i| format!("row_{i}")));

    let rows: Vec<Vec<Cell>> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(ci, name)| {
            let mut row = Vec::with_capacity(table.row_count() + 1);
            row.push(Cell::Text(name.clone()));
            row.extend(table.rows().iter().map(|r| r[ci].clone()));
            row
        })
        .collect();

    table.derive(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long() -> Table {
        Table::new(
            vec!["city".into(), "quarter".into(), "sales".into()],
            vec![
                vec!["NY".into(), "Q1".into(), 10.into()],
                vec!["NY".into(), "Q2".into(), 20.into()],
                vec!["LA".into(), "Q1".into(), 30.into()],
                vec!["NY".into(), "Q1".into(), 5.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn pivot_first_seen_layout() {
        let out = pivot(
            &long(),
            &PivotConfig {
                index_column: "city".into(),
                column_column: "quarter".into(),
                value_column: "sales".into(),
                aggregation: AggFn::Sum,
            },
        )
        .unwrap();

        assert_eq!(out.columns(), &["city".to_string(), "Q1".into(), "Q2".into()]);
        assert_eq!(out.row_count(), 2);
        // NY/Q1 collides twice: 10 + 5
        assert_eq!(out.rows()[0], vec!["NY".into(), 15.into(), 20.into()]);
        assert_eq!(out.rows()[1], vec!["LA".into(), 30.into(), Cell::Null]);
    }

    #[test]
    fn pivot_default_aggregation_is_first() {
        let out = pivot(
            &long(),
            &PivotConfig {
                index_column: "city".into(),
                column_column: "quarter".into(),
                value_column: "sales".into(),
                aggregation: AggFn::First,
            },
        )
        .unwrap();
        assert_eq!(out.rows()[0][1], 10.into());
    }

    #[test]
    fn unpivot_defaults_to_non_id_columns() {
        let wide = Table::new(
            vec!["city".into(), "Q1".into(), "Q2".into()],
            vec![vec!["NY".into(), 10.into(), 20.into()]],
        )
        .unwrap();
        let out = unpivot(
            &wide,
            &UnpivotConfig {
                id_columns: vec!["city".into()],
                value_columns: None,
            },
        )
        .unwrap();
        assert_eq!(
            out.columns(),
            &["city".to_string(), "variable".into(), "value".into()]
        );
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows()[0], vec!["NY".into(), "Q1".into(), 10.into()]);
        assert_eq!(out.rows()[1], vec!["NY".into(), "Q2".into(), 20.into()]);
    }

    #[test]
    fn unpivot_unknown_id_fails() {
        let err = unpivot(
            &long(),
            &UnpivotConfig {
                id_columns: vec!["ghost".into()],
                value_columns: None,
            },
        )
        .unwrap_err();
        assert!(err.has_code(tabflow_common::codes::UNKNOWN_COLUMN));
    }

    #[test]
    fn transpose_round_shape() {
        let out = transpose(&long());
        assert_eq!(out.column_count(), 5); // column + 4 rows
        assert_eq!(out.row_count(), 3); // one per original column
        assert_eq!(out.rows()[0][0], "city".into());
        assert_eq!(out.rows()[2][1], 10.into());
    }

    #[test]
    fn transpose_empty_table() {
        let empty = Table::new(vec!["a".into()], vec![]).unwrap();
        let out = transpose(&empty);
        assert_eq!(out.columns(), &["column".to_string()]);
        assert_eq!(out.row_count(), 1);
    }
}
