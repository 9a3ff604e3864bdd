//! The operator library: pure functions from tables (plus configuration)
//! to new tables.
//!
//! Operators never mutate their input. Row order is preserved except where
//! an operator explicitly reorders (sort, group) or filters rows (filter,
//! slice, outlier removal, sampling).

pub mod basic;
pub mod clean;
pub mod filter;
pub mod group;
pub mod join;
pub mod reshape;
pub mod sample;
pub mod sort;

pub use basic::{
    ColumnStats, add_column, column_stats, remove_columns, rename_columns, slice, unique_values,
};
pub use clean::{
    FillStrategy, NormalizeMethod, OutlierMethod, fill_missing, normalize, remove_outliers,
};
pub use filter::{Combinator, FilterOp, FilterRhs, Predicate, filter};
pub use group::{AggFn, Aggregation, GroupConfig, group};
pub use join::{JoinConfig, JoinType, join};
pub use reshape::{PivotConfig, UnpivotConfig, pivot, transpose, unpivot};
pub use sample::{SampleConfig, SampleMethod, sample};
pub use sort::{SortDirection, SortKey, sort};

use std::cmp::Ordering;

use tabflow_common::Cell;

use crate::table::ColumnType;

/// Type-aware total ordering over cells, shared by sort, min/max statistics,
/// and the comparison filter operators.
///
/// Nulls order before everything else; numbers compare numerically (with
/// lenient text coercion), timestamps as instants, booleans false < true,
/// and everything else case-insensitively on string form.
pub(crate) fn compare_cells(a: &Cell, b: &Cell, ty: ColumnType) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    match ty {
        ColumnType::Number => match (a.coerce_number(), b.coerce_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => text_cmp(a, b),
        },
        ColumnType::Timestamp => match (a.coerce_timestamp(), b.coerce_timestamp()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => text_cmp(a, b),
        },
        ColumnType::Boolean => match (a.coerce_bool(), b.coerce_bool()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => text_cmp(a, b),
        },
        _ => text_cmp(a, b),
    }
}

fn text_cmp(a: &Cell, b: &Cell) -> Ordering {
    a.to_text().to_lowercase().cmp(&b.to_text().to_lowercase())
}

/// Ordering with the comparison type chosen from the cells themselves —
/// used when no column type is available (filter against config literals).
pub(crate) fn compare_dynamic(a: &Cell, b: &Cell) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    if let (Some(x), Some(y)) = (a.coerce_number(), b.coerce_number()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.coerce_timestamp(), b.coerce_timestamp()) {
        return Some(x.cmp(&y));
    }
    Some(text_cmp(a, b))
}
