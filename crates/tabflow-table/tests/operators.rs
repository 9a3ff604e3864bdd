//! End-to-end operator scenarios over a small employee dataset.

use tabflow_common::Cell;
use tabflow_table::ops::{
    AggFn, Aggregation, FilterOp, GroupConfig, JoinConfig, JoinType, Predicate, SortKey, filter,
    group, join, sort,
};
use tabflow_table::table::Table;

fn employees() -> Table {
    Table::new(
        vec!["name".into(), "age".into(), "city".into(), "salary".into()],
        vec![
            vec!["Alice".into(), 30.into(), "NY".into(), 75000.into()],
            vec!["Bob".into(), 25.into(), "LA".into(), 65000.into()],
            vec!["Charlie".into(), 35.into(), "Chicago".into(), 80000.into()],
            vec!["Diana".into(), 28.into(), "NY".into(), 70000.into()],
            vec!["Eve".into(), 32.into(), "LA".into(), 85000.into()],
        ],
    )
    .unwrap()
}

fn cities() -> Table {
    Table::new(
        vec!["city".into(), "state".into(), "population".into()],
        vec![
            vec!["NY".into(), "NY".into(), 8_000_000.into()],
            vec!["LA".into(), "CA".into(), 4_000_000.into()],
            vec!["Chicago".into(), "IL".into(), 2_700_000.into()],
            vec!["Houston".into(), "TX".into(), 2_300_000.into()],
        ],
    )
    .unwrap()
}

fn names(t: &Table) -> Vec<String> {
    t.rows().iter().map(|r| r[0].to_text()).collect()
}

#[test]
fn filter_then_sort_pipeline() {
    let filtered = filter(
        &employees(),
        &Predicate::leaf("age", FilterOp::GreaterThan, 27.into()),
    );
    let sorted = sort(&filtered, &[SortKey::desc("salary")]);

    assert_eq!(names(&sorted), vec!["Eve", "Charlie", "Alice", "Diana"]);
    sorted.validate().unwrap();
}

#[test]
fn group_by_city_with_aggregations() {
    let out = group(
        &employees(),
        &GroupConfig {
            group_columns: vec!["city".into()],
            aggregations: vec![
                Aggregation::new(AggFn::Avg, "salary").with_alias("avg_salary"),
                Aggregation::new(AggFn::Max, "age").with_alias("max_age"),
                Aggregation::new(AggFn::Count, "name").with_alias("count"),
            ],
        },
    )
    .unwrap();

    assert_eq!(
        out.columns(),
        &[
            "city".to_string(),
            "avg_salary".into(),
            "max_age".into(),
            "count".into()
        ]
    );

    let la = out
        .rows()
        .iter()
        .find(|r| r[0] == "LA".into())
        .expect("LA group present");
    assert_eq!(la[1], Cell::Number(75000.0));
    assert_eq!(la[2], Cell::Number(32.0));
    assert_eq!(la[3], Cell::Number(2.0));
}

#[test]
fn inner_join_on_city() {
    let out = join(
        &employees(),
        &cities(),
        &JoinConfig::new(JoinType::Inner, "city", "city"),
    )
    .unwrap();

    assert_eq!(out.row_count(), 5);
    assert_eq!(
        out.columns(),
        &[
            "name".to_string(),
            "age".into(),
            "city".into(),
            "salary".into(),
            "state".into(),
            "population".into()
        ]
    );
    assert_eq!(
        out.rows()[0],
        vec![
            "Alice".into(),
            30.into(),
            "NY".into(),
            75000.into(),
            "NY".into(),
            8_000_000.into()
        ]
    );
    assert!(out.rows().iter().all(|r| r[2] != "Houston".into()));
}

#[test]
fn empty_table_through_operators_keeps_columns() {
    let empty = Table::new(
        vec!["name".into(), "age".into(), "city".into(), "salary".into()],
        vec![],
    )
    .unwrap();

    let filtered = filter(&empty, &Predicate::leaf("age", FilterOp::GreaterThan, 1.into()));
    assert_eq!(filtered.row_count(), 0);
    assert_eq!(filtered.columns(), empty.columns());

    let sorted = sort(&empty, &[SortKey::asc("age")]);
    assert_eq!(sorted.row_count(), 0);
    assert_eq!(sorted.columns(), empty.columns());

    let grouped = group(
        &empty,
        &GroupConfig {
            group_columns: vec!["city".into()],
            aggregations: vec![Aggregation::new(AggFn::Sum, "salary")],
        },
    )
    .unwrap();
    assert_eq!(grouped.row_count(), 0);
    assert_eq!(
        grouped.columns(),
        &["city".to_string(), "sum_salary".to_string()]
    );
}

#[test]
fn metadata_stays_in_sync_through_a_pipeline() {
    let out = sort(
        &filter(
            &employees(),
            &Predicate::leaf("city", FilterOp::NotEquals, "NY".into()),
        ),
        &[SortKey::asc("name")],
    );

    assert_eq!(out.meta.row_count, out.rows().len());
    assert_eq!(out.meta.column_count, out.columns().len());
    assert_eq!(out.meta.types.len(), out.columns().len());
    out.validate().unwrap();
}
