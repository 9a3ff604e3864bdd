//! Row filtering over leaf predicates and AND/OR trees.

use serde::{Deserialize, Serialize};

use tabflow_common::Cell;

use crate::table::Table;

use super::compare_dynamic;

/// Comparison operator of a leaf predicate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    GreaterThan,
    #[serde(alias = "greater_than_or_equal", alias = "gte")]
    GreaterOrEqual,
    LessThan,
    #[serde(alias = "less_than_or_equal", alias = "lte")]
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    In,
    NotIn,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

/// Right-hand side of a leaf: nothing (is_null), one value, or a value list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterRhs {
    Many(Vec<Cell>),
    One(Cell),
}

impl FilterRhs {
    fn as_list(&self) -> &[Cell] {
        match self {
            FilterRhs::Many(v) => v,
            FilterRhs::One(c) => std::slice::from_ref(c),
        }
    }

    fn as_single(&self) -> &Cell {
        match self {
            FilterRhs::One(c) => c,
            FilterRhs::Many(v) => v.first().unwrap_or(&Cell::Null),
        }
    }
}

/// A predicate: either a leaf `(column, operator, value)` or a boolean
/// combination of children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predicate {
    Group {
        combinator: Combinator,
        children: Vec<Predicate>,
    },
    Leaf {
        column: String,
        #[serde(rename = "operator")]
        op: FilterOp,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        value: Option<FilterRhs>,
    },
}

impl Predicate {
    pub fn leaf<S: Into<String>>(column: S, op: FilterOp, value: Cell) -> Self {
        Predicate::Leaf {
            column: column.into(),
            op,
            value: Some(FilterRhs::One(value)),
        }
    }

    pub fn null_check<S: Into<String>>(column: S, op: FilterOp) -> Self {
        Predicate::Leaf {
            column: column.into(),
            op,
            value: None,
        }
    }

    pub fn all(children: Vec<Predicate>) -> Self {
        Predicate::Group {
            combinator: Combinator::And,
            children,
        }
    }

    pub fn any(children: Vec<Predicate>) -> Self {
        Predicate::Group {
            combinator: Combinator::Or,
            children,
        }
    }
}

/// Keep the rows for which the predicate holds. Row order is preserved.
///
/// A leaf naming a column the table does not have keeps the row: the editor
/// sends half-configured predicates while the user is still typing, and the
/// permissive policy keeps data visible.
pub fn filter(table: &Table, predicate: &Predicate) -> Table {
    let rows = table
        .rows()
        .iter()
        .filter(|row| eval_predicate(table, row, predicate))
        .cloned()
        .collect();
    table.derive_rows(rows)
}

fn eval_predicate(table: &Table, row: &[Cell], predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Group {
            combinator: Combinator::And,
            children,
        } => children.iter().all(|p| eval_predicate(table, row, p)),
        Predicate::Group {
            combinator: Combinator::Or,
            children,
        } => {
            // An empty OR keeps the row, matching the empty-AND convention.
            children.is_empty() || children.iter().any(|p| eval_predicate(table, row, p))
        }
        Predicate::Leaf { column, op, value } => {
            let Ok(index) = table.column_index(column) else {
                return true; // permissive: unknown column keeps the row
            };
            eval_leaf(&row[index], *op, value.as_ref())
        }
    }
}

fn eval_leaf(cell: &Cell, op: FilterOp, rhs: Option<&FilterRhs>) -> bool {
    use FilterOp::*;

    match op {
        IsNull => return cell.is_null(),
        IsNotNull => return !cell.is_null(),
        _ => {}
    }

    // All remaining operators are comparisons: null never matches.
    if cell.is_null() {
        return false;
    }
    let Some(rhs) = rhs else { return false };

    match op {
        Equals => cells_equal(cell, rhs.as_single()),
        NotEquals => !cells_equal(cell, rhs.as_single()),
        GreaterThan => matches!(
            compare_dynamic(cell, rhs.as_single()),
            Some(std::cmp::Ordering::Greater)
        ),
        GreaterOrEqual => matches!(
            compare_dynamic(cell, rhs.as_single()),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        LessThan => matches!(
            compare_dynamic(cell, rhs.as_single()),
            Some(std::cmp::Ordering::Less)
        ),
        LessOrEqual => matches!(
            compare_dynamic(cell, rhs.as_single()),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        Contains => text_of(cell).contains(&text_of(rhs.as_single())),
        NotContains => !text_of(cell).contains(&text_of(rhs.as_single())),
        StartsWith => text_of(cell).starts_with(&text_of(rhs.as_single())),
        EndsWith => text_of(cell).ends_with(&text_of(rhs.as_single())),
        In => rhs.as_list().iter().any(|v| cells_equal(cell, v)),
        NotIn => !rhs.as_list().iter().any(|v| cells_equal(cell, v)),
        IsNull | IsNotNull => unreachable!(),
    }
}

fn text_of(cell: &Cell) -> String {
    cell.to_text().to_lowercase()
}

/// Equality with numeric coercion and case-insensitive text.
fn cells_equal(a: &Cell, b: &Cell) -> bool {
    if let (Some(x), Some(y)) = (a.coerce_number(), b.coerce_number()) {
        return x == y;
    }
    text_of(a) == text_of(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    fn people() -> Table {
        Table::new(
            vec!["name".into(), "age".into(), "city".into()],
            vec![
                vec!["Alice".into(), 30.into(), "NY".into()],
                vec!["Bob".into(), 25.into(), "LA".into()],
                vec!["Carol".into(), Cell::Null, "ny".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn greater_than_skips_nulls() {
        let out = filter(&people(), &Predicate::leaf("age", FilterOp::GreaterThan, 26.into()));
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows()[0][0], "Alice".into());
    }

    #[test]
    fn equals_is_case_insensitive_for_text() {
        let out = filter(&people(), &Predicate::leaf("city", FilterOp::Equals, "Ny".into()));
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn unknown_column_keeps_rows() {
        let out = filter(&people(), &Predicate::leaf("ghost", FilterOp::Equals, 1.into()));
        assert_eq!(out.row_count(), 3);
    }

    #[test]
    fn null_checks() {
        let out = filter(&people(), &Predicate::null_check("age", FilterOp::IsNull));
        assert_eq!(out.row_count(), 1);
        let out = filter(&people(), &Predicate::null_check("age", FilterOp::IsNotNull));
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn not_equals_is_false_on_null() {
        let out = filter(&people(), &Predicate::leaf("age", FilterOp::NotEquals, 99.into()));
        // Carol's null age does not satisfy not_equals.
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn and_or_trees() {
        let pred = Predicate::any(vec![
            Predicate::leaf("city", FilterOp::Equals, "LA".into()),
            Predicate::all(vec![
                Predicate::leaf("age", FilterOp::GreaterOrEqual, 30.into()),
                Predicate::leaf("name", FilterOp::StartsWith, "a".into()),
            ]),
        ]);
        let out = filter(&people(), &pred);
        let names: Vec<String> = out.rows().iter().map(|r| r[0].to_text()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn in_and_not_in() {
        let pred = Predicate::Leaf {
            column: "city".into(),
            op: FilterOp::In,
            value: Some(FilterRhs::Many(vec!["ny".into(), "chicago".into()])),
        };
        assert_eq!(filter(&people(), &pred).row_count(), 2);

        let pred = Predicate::Leaf {
            column: "city".into(),
            op: FilterOp::NotIn,
            value: Some(FilterRhs::Many(vec!["la".into()])),
        };
        assert_eq!(filter(&people(), &pred).row_count(), 2);
    }

    #[test]
    fn numeric_text_compares_numerically() {
        let table = Table::new(
            vec!["v".into()],
            vec![vec!["9".into()], vec!["10".into()]],
        )
        .unwrap();
        let out = filter(&table, &Predicate::leaf("v", FilterOp::GreaterThan, 9.5.into()));
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows()[0][0], "10".into());
    }

    #[test]
    fn filter_is_idempotent() {
        let pred = Predicate::leaf("age", FilterOp::GreaterThan, 26.into());
        let once = filter(&people(), &pred);
        let twice = filter(&once, &pred);
        assert_eq!(once.rows(), twice.rows());
    }

    #[test]
    fn deserializes_from_editor_json() {
        let pred: Predicate = serde_json::from_str(
            r#"{"combinator":"and","children":[
                {"column":"age","operator":"greater_than","value":27},
                {"column":"city","operator":"in","value":["NY","LA"]}
            ]}"#,
        )
        .unwrap();
        let out = filter(&people(), &pred);
        assert_eq!(out.row_count(), 1);
    }
}
