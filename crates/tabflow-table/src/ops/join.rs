//! Equality hash joins: inner, left, right, outer.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tabflow_common::{AppError, Cell};

use crate::table::Table;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfig {
    #[serde(rename = "type")]
    pub join_type: JoinType,
    pub left_key: String,
    pub right_key: String,
    /// Appended to right-side column names that clash with left-side ones.
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_suffix() -> String {
    "_right".to_string()
}

impl JoinConfig {
    pub fn new(join_type: JoinType, left_key: &str, right_key: &str) -> Self {
        Self {
            join_type,
            left_key: left_key.to_string(),
            right_key: right_key.to_string(),
            suffix: default_suffix(),
        }
    }
}

/// Join two tables on key equality.
///
/// Output columns are the left columns followed by the right columns minus
/// the right key; clashes get the configured suffix. A left row with k
/// matches produces k rows. Null keys never match. Row order: left scan
/// order, then (for right/outer) the remaining right-only rows.
pub fn join(left: &Table, right: &Table, config: &JoinConfig) -> Result<Table, AppError> {
    let left_key = left.column_index(&config.left_key)?;
    let right_key = right.column_index(&config.right_key)?;

    let left_names: FxHashSet<&str> = left.columns().iter().map(|s| s.as_str()).collect();

    // Right columns that survive into the output, with clash suffixing.
    let right_out: Vec<(usize, String)> = right
        .columns()
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != right_key)
        .map(|(i, name)| {
            let out = if left_names.contains(name.as_str()) {
                format!("{name}{}", config.suffix)
            } else {
                name.clone()
            };
            (i, out)
        })
        .collect();

    let mut columns: Vec<String> = left.columns().to_vec();
    columns.extend(right_out.iter().map(|(_, name)| name.clone()));

    // Hash the right side; nulls never participate.
    let mut by_key: FxHashMap<&Cell, Vec<usize>> = FxHashMap::default();
    for (i, row) in right.rows().iter().enumerate() {
        let key = &row[right_key];
        if !key.is_null() {
            by_key.entry(key).or_default().push(i);
        }
    }

    let emit_right = matches!(config.join_type, JoinType::Right | JoinType::Outer);
    let emit_left_unmatched = matches!(config.join_type, JoinType::Left | JoinType::Outer);

    let mut matched_right: FxHashSet<usize> = FxHashSet::default();
    let mut rows: Vec<Vec<Cell>> = Vec::new();

    for left_row in left.rows() {
        let key = &left_row[left_key];
        let matches = if key.is_null() {
            None
        } else {
            by_key.get(key)
        };

        match matches {
            Some(indices) => {
                for &ri in indices {
                    if emit_right {
                        matched_right.insert(ri);
                    }
                    let mut row = left_row.clone();
                    let right_row = &right.rows()[ri];
                    row.extend(right_out.iter().map(|&(i, _)| right_row[i].clone()));
                    rows.push(row);
                }
            }
            None => {
                if emit_left_unmatched {
                    let mut row = left_row.clone();
                    row.extend(std::iter::repeat_n(Cell::Null, right_out.len()));
                    rows.push(row);
                }
            }
        }
    }

    if emit_right {
        for (ri, right_row) in right.rows().iter().enumerate() {
            if matched_right.contains(&ri) {
                continue;
            }
            // Left columns null, except the left key position carries the
            // right key's value so the join key is never lost.
            let mut row = vec![Cell::Null; left.column_count()];
            row[left_key] = right_row[right_key].clone();
            row.extend(right_out.iter().map(|&(i, _)| right_row[i].clone()));
            rows.push(row);
        }
    }

    Ok(left.derive(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Table {
        Table::new(
            vec!["id".into(), "city".into(), "total".into()],
            vec![
                vec![1.into(), "NY".into(), 10.into()],
                vec![2.into(), "LA".into(), 20.into()],
                vec![3.into(), "Austin".into(), 30.into()],
                vec![4.into(), Cell::Null, 40.into()],
            ],
        )
        .unwrap()
    }

    fn cities() -> Table {
        Table::new(
            vec!["city".into(), "state".into()],
            vec![
                vec!["NY".into(), "NY".into()],
                vec!["LA".into(), "CA".into()],
                vec!["LA".into(), "CA-2".into()],
                vec!["Houston".into(), "TX".into()],
                vec![Cell::Null, "??".into()],
            ],
        )
        .unwrap()
    }

    fn cfg(join_type: JoinType) -> JoinConfig {
        JoinConfig::new(join_type, "city", "city")
    }

    #[test]
    fn inner_join_with_duplicate_matches() {
        let out = join(&orders(), &cities(), &cfg(JoinType::Inner)).unwrap();
        // NY matches once, LA matches twice; Austin and null don't match.
        assert_eq!(out.row_count(), 3);
        assert_eq!(
            out.columns(),
            &["id".to_string(), "city".into(), "total".into(), "state".into()]
        );
        assert_eq!(out.rows()[1][3], "CA".into());
        assert_eq!(out.rows()[2][3], "CA-2".into());
    }

    #[test]
    fn left_join_fills_nulls() {
        let out = join(&orders(), &cities(), &cfg(JoinType::Left)).unwrap();
        assert_eq!(out.row_count(), 5);
        let austin = out
            .rows()
            .iter()
            .find(|r| r[1] == "Austin".into())
            .unwrap();
        assert_eq!(austin[3], Cell::Null);
    }

    #[test]
    fn right_join_emits_right_only_rows_last() {
        let out = join(&orders(), &cities(), &cfg(JoinType::Right)).unwrap();
        // 3 matched + Houston + null-key city row
        assert_eq!(out.row_count(), 5);
        let last_two: Vec<&Vec<Cell>> = out.rows().iter().rev().take(2).collect();
        // right-only rows carry the right key into the left key slot
        assert!(last_two.iter().any(|r| r[1] == "Houston".into()));
        for row in last_two {
            assert_eq!(row[0], Cell::Null); // id
            assert_eq!(row[2], Cell::Null); // total
        }
    }

    #[test]
    fn outer_join_unions_both_sides() {
        let out = join(&orders(), &cities(), &cfg(JoinType::Outer)).unwrap();
        // 3 matched + Austin + null-key order + Houston + null-key city
        assert_eq!(out.row_count(), 7);
    }

    #[test]
    fn nulls_never_match_nulls() {
        let out = join(&orders(), &cities(), &cfg(JoinType::Inner)).unwrap();
        assert!(out.rows().iter().all(|r| r[1] != Cell::Null));
    }

    #[test]
    fn clash_gets_suffix() {
        let right = Table::new(
            vec!["city".into(), "total".into()],
            vec![vec!["NY".into(), 99.into()]],
        )
        .unwrap();
        let out = join(&orders(), &right, &cfg(JoinType::Inner)).unwrap();
        assert_eq!(
            out.columns(),
            &[
                "id".to_string(),
                "city".into(),
                "total".into(),
                "total_right".into()
            ]
        );
    }

    #[test]
    fn unknown_key_fails() {
        let err = join(
            &orders(),
            &cities(),
            &JoinConfig::new(JoinType::Inner, "ghost", "city"),
        )
        .unwrap_err();
        assert!(err.has_code(tabflow_common::codes::UNKNOWN_COLUMN));
    }
}
