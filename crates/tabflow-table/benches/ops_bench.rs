use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tabflow_common::Cell;
use tabflow_table::ops::{
    AggFn, Aggregation, FilterOp, GroupConfig, Predicate, SortKey, filter, group, sort,
};
use tabflow_table::table::Table;

fn fixture(rows: usize) -> Table {
    let data = (0..rows)
        .map(|i| {
            vec![
                Cell::Text(format!("user_{}", i % 1000)),
                Cell::Number((i % 97) as f64),
                Cell::Text(format!("city_{}", i % 13)),
            ]
        })
        .collect();
    Table::new(vec!["name".into(), "score".into(), "city".into()], data).unwrap()
}

fn bench_sort(c: &mut Criterion) {
    let table = fixture(20_000);
    c.bench_function("sort_20k_two_keys", |b| {
        b.iter(|| {
            black_box(sort(
                &table,
                &[SortKey::asc("city"), SortKey::desc("score")],
            ))
        })
    });
}

fn bench_filter(c: &mut Criterion) {
    let table = fixture(20_000);
    let pred = Predicate::all(vec![
        Predicate::leaf("score", FilterOp::GreaterThan, 40.into()),
        Predicate::leaf("city", FilterOp::NotEquals, "city_3".into()),
    ]);
    c.bench_function("filter_20k_tree", |b| {
        b.iter(|| black_box(filter(&table, &pred)))
    });
}

fn bench_group(c: &mut Criterion) {
    let table = fixture(20_000);
    let cfg = GroupConfig {
        group_columns: vec!["city".into()],
        aggregations: vec![
            Aggregation::new(AggFn::Avg, "score"),
            Aggregation::count(),
        ],
    };
    c.bench_function("group_20k_by_city", |b| {
        b.iter(|| black_box(group(&table, &cfg)))
    });
}

criterion_group!(benches, bench_sort, bench_filter, bench_group);
criterion_main!(benches);
