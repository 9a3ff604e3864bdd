//! Hash-grouped aggregation.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use tabflow_common::{AppError, Cell};

use crate::table::Table;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
}

impl AggFn {
    fn name(&self) -> &'static str {
        match self {
            AggFn::Count => "count",
            AggFn::Sum => "sum",
            AggFn::Avg => "avg",
            AggFn::Min => "min",
            AggFn::Max => "max",
            AggFn::First => "first",
            AggFn::Last => "last",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggFn,
    /// Source column; `count` may omit it to count rows.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub column: Option<String>,
    /// Output column name; defaults to `<fn>_<column>`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alias: Option<String>,
}

impl Aggregation {
    pub fn new(function: AggFn, column: &str) -> Self {
        Self {
            function,
            column: Some(column.to_string()),
            alias: None,
        }
    }

    pub fn count() -> Self {
        Self {
            function: AggFn::Count,
            column: None,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.column {
            Some(column) => format!("{}_{}", self.function.name(), column),
            None => self.function.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    pub group_columns: Vec<String>,
    pub aggregations: Vec<Aggregation>,
}

/// Numeric accumulator shared by sum/avg/min/max.
#[derive(Debug, Default, Clone)]
struct NumericAcc {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl NumericAcc {
    fn push(&mut self, n: f64) {
        if self.count == 0 {
            self.min = n;
            self.max = n;
        } else {
            self.min = self.min.min(n);
            self.max = self.max.max(n);
        }
        self.sum += n;
        self.count += 1;
    }
}

/// Accumulator for one aggregation over one group. Also reused by pivot
/// for cell-collision aggregation.
#[derive(Debug, Clone)]
pub(crate) struct AggState {
    rows: usize,
    non_null: usize,
    numeric: NumericAcc,
    first: Option<Cell>,
    last: Option<Cell>,
}

impl Default for AggState {
    fn default() -> Self {
        Self::new()
    }
}

impl AggState {
    pub(crate) fn new() -> Self {
        Self {
            rows: 0,
            non_null: 0,
            numeric: NumericAcc::default(),
            first: None,
            last: None,
        }
    }

    pub(crate) fn push(&mut self, cell: Option<&Cell>) {
        self.rows += 1;
        let Some(cell) = cell else { return };
        if !cell.is_null() {
            self.non_null += 1;
        }
        if let Some(n) = cell.as_number() {
            self.numeric.push(n);
        }
        if self.first.is_none() {
            self.first = Some(cell.clone());
        }
        self.last = Some(cell.clone());
    }

    pub(crate) fn finish(&self, function: AggFn, has_column: bool) -> Cell {
        match function {
            AggFn::Count => {
                let count = if has_column { self.non_null } else { self.rows };
                Cell::Number(count as f64)
            }
            AggFn::Sum => {
                if self.numeric.count == 0 {
                    Cell::Null
                } else {
                    Cell::Number(self.numeric.sum)
                }
            }
            AggFn::Avg => {
                if self.numeric.count == 0 {
                    Cell::Null
                } else {
                    Cell::Number(self.numeric.sum / self.numeric.count as f64)
                }
            }
            AggFn::Min => {
                if self.numeric.count == 0 {
                    Cell::Null
                } else {
                    Cell::Number(self.numeric.min)
                }
            }
            AggFn::Max => {
                if self.numeric.count == 0 {
                    Cell::Null
                } else {
                    Cell::Number(self.numeric.max)
                }
            }
            AggFn::First => self.first.clone().unwrap_or(Cell::Null),
            AggFn::Last => self.last.clone().unwrap_or(Cell::Null),
        }
    }
}

type GroupKey = SmallVec<[Cell; 4]>;

/// Group rows by the configured columns and aggregate.
///
/// One output row per distinct tuple of group values (null is its own key),
/// in first-seen order. Output columns are the group columns followed by
/// the aggregation aliases. Fails with `UnknownColumn` when a named column
/// is absent.
pub fn group(table: &Table, config: &GroupConfig) -> Result<Table, AppError> {
    let key_indices: Vec<usize> = config
        .group_columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<_, _>>()?;

    let agg_indices: Vec<Option<usize>> = config
        .aggregations
        .iter()
        .map(|a| match &a.column {
            Some(column) => table.column_index(column).map(Some),
            None => Ok(None),
        })
        .collect::<Result<_, _>>()?;

    let mut out_columns: Vec<String> = config.group_columns.clone();
    for agg in &config.aggregations {
        out_columns.push(agg.output_name());
    }

    // first-seen group order
    let mut index_of: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut keys: Vec<GroupKey> = Vec::new();
    let mut states: Vec<Vec<AggState>> = Vec::new();

    for row in table.rows() {
        let key: GroupKey = key_indices.iter().map(|&i| row[i].clone()).collect();
        let slot = *index_of.entry(key.clone()).or_insert_with(|| {
            keys.push(key);
            states.push(vec![AggState::new(); config.aggregations.len()]);
            states.len() - 1
        });
        for (state, index) in states[slot].iter_mut().zip(agg_indices.iter().copied()) {
            state.push(index.map(|i| &row[i]));
        }
    }

    let rows: Vec<Vec<Cell>> = keys
        .into_iter()
        .zip(states)
        .map(|(key, state)| {
            let mut row: Vec<Cell> = key.into_vec();
            for (agg, st) in config.aggregations.iter().zip(state) {
                row.push(st.finish(agg.function, agg.column.is_some()));
            }
            row
        })
        .collect();

    Ok(table.derive(out_columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Table {
        Table::new(
            vec!["city".into(), "amount".into()],
            vec![
                vec!["NY".into(), 10.into()],
                vec!["LA".into(), 20.into()],
                vec!["NY".into(), 30.into()],
                vec![Cell::Null, 5.into()],
                vec!["LA".into(), Cell::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn groups_in_first_seen_order() {
        let out = group(
            &sales(),
            &GroupConfig {
                group_columns: vec!["city".into()],
                aggregations: vec![Aggregation::new(AggFn::Sum, "amount")],
            },
        )
        .unwrap();

        assert_eq!(out.columns(), &["city".to_string(), "sum_amount".to_string()]);
        let cities: Vec<String> = out.rows().iter().map(|r| r[0].to_text()).collect();
        assert_eq!(cities, vec!["NY", "LA", ""]);
        assert_eq!(out.rows()[0][1], Cell::Number(40.0));
    }

    #[test]
    fn null_is_its_own_group() {
        let out = group(
            &sales(),
            &GroupConfig {
                group_columns: vec!["city".into()],
                aggregations: vec![Aggregation::count()],
            },
        )
        .unwrap();
        assert_eq!(out.row_count(), 3);
        // the null-city group has one row
        assert_eq!(out.rows()[2][0], Cell::Null);
        assert_eq!(out.rows()[2][1], Cell::Number(1.0));
    }

    #[test]
    fn avg_ignores_non_numeric_and_empty_is_null() {
        let t = Table::new(
            vec!["k".into(), "v".into()],
            vec![
                vec!["a".into(), "oops".into()],
                vec!["a".into(), 4.into()],
                vec!["b".into(), "text".into()],
            ],
        )
        .unwrap();
        let out = group(
            &t,
            &GroupConfig {
                group_columns: vec!["k".into()],
                aggregations: vec![Aggregation::new(AggFn::Avg, "v")],
            },
        )
        .unwrap();
        assert_eq!(out.rows()[0][1], Cell::Number(4.0));
        assert_eq!(out.rows()[1][1], Cell::Null);
    }

    #[test]
    fn count_without_column_counts_rows() {
        let out = group(
            &sales(),
            &GroupConfig {
                group_columns: vec!["city".into()],
                aggregations: vec![
                    Aggregation::count(),
                    Aggregation::new(AggFn::Count, "amount"),
                ],
            },
        )
        .unwrap();
        assert_eq!(out.columns()[1], "count");
        assert_eq!(out.columns()[2], "count_amount");
        // LA: two rows, one null amount
        assert_eq!(out.rows()[1][1], Cell::Number(2.0));
        assert_eq!(out.rows()[1][2], Cell::Number(1.0));
    }

    #[test]
    fn first_and_last() {
        let out = group(
            &sales(),
            &GroupConfig {
                group_columns: vec!["city".into()],
                aggregations: vec![
                    Aggregation::new(AggFn::First, "amount"),
                    Aggregation::new(AggFn::Last, "amount"),
                ],
            },
        )
        .unwrap();
        // NY: first 10, last 30
        assert_eq!(out.rows()[0][1], Cell::Number(10.0));
        assert_eq!(out.rows()[0][2], Cell::Number(30.0));
    }

    #[test]
    fn unknown_group_column_fails() {
        let err = group(
            &sales(),
            &GroupConfig {
                group_columns: vec!["ghost".into()],
                aggregations: vec![],
            },
        )
        .unwrap_err();
        assert!(err.has_code(tabflow_common::codes::UNKNOWN_COLUMN));
    }

    #[test]
    fn empty_table_groups_to_zero_rows_with_output_columns() {
        let empty = Table::new(vec!["city".into(), "amount".into()], vec![]).unwrap();
        let out = group(
            &empty,
            &GroupConfig {
                group_columns: vec!["city".into()],
                aggregations: vec![Aggregation::new(AggFn::Sum, "amount")],
            },
        )
        .unwrap();
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.columns(), &["city".to_string(), "sum_amount".to_string()]);
    }
}
