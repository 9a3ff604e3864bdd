//! Stable multi-key sort with type-aware comparison.

use std::cmp::Ordering;

use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};

use crate::table::{ColumnType, Table};

use super::compare_cells;

/// Row-count threshold above which the comparison sort runs on the rayon
/// pool. Both paths are stable merge sorts.
const PARALLEL_SORT_THRESHOLD: usize = 8_192;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

/// One sort key: column, direction, and an optional comparison-type
/// override (defaults to the column's inferred type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default = "default_direction")]
    pub direction: SortDirection,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub ty: Option<ColumnType>,
}

fn default_direction() -> SortDirection {
    SortDirection::Asc
}

impl SortKey {
    pub fn asc<S: Into<String>>(column: S) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
            ty: None,
        }
    }

    pub fn desc<S: Into<String>>(column: S) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
            ty: None,
        }
    }
}

/// Sort rows by the given keys; ties on key i break by key i+1, and fully
/// tied rows keep their input order (the sort is stable).
///
/// A key naming an unknown column compares all rows equal rather than
/// failing — the editor sends half-configured keys while the user picks a
/// column, and sorting by nothing is a harmless identity.
pub fn sort(table: &Table, keys: &[SortKey]) -> Table {
    // (column index, effective type, descending) per usable key
    let resolved: Vec<(usize, ColumnType, bool)> = keys
        .iter()
        .filter_map(|key| {
            let index = table.column_index(&key.column).ok()?;
            let ty = key
                .ty
                .or_else(|| table.column_type(&key.column))
                .unwrap_or(ColumnType::Text);
            Some((index, ty, key.direction == SortDirection::Desc))
        })
        .collect();

    if resolved.is_empty() || table.row_count() < 2 {
        return table.derive_rows(table.rows().to_vec());
    }

    let mut order: Vec<usize> = (0..table.row_count()).collect();
    let rows = table.rows();

    let cmp = |a: &usize, b: &usize| -> Ordering {
        for &(index, ty, desc) in &resolved {
            let ord = compare_cells(&rows[*a][index], &rows[*b][index], ty);
            let ord = if desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    };

    if table.row_count() >= PARALLEL_SORT_THRESHOLD {
        order.par_sort_by(cmp);
    } else {
        order.sort_by(cmp);
    }

    let sorted = order.into_iter().map(|i| rows[i].clone()).collect();
    table.derive_rows(sorted)
}
