//! Property tests for the operator laws: sort/filter idempotence, sort
//! stability, and invariant preservation.

use proptest::prelude::*;

use tabflow_common::Cell;
use tabflow_table::ops::{FilterOp, Predicate, SortKey, filter, slice, sort};
use tabflow_table::table::Table;

fn arb_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        Just(Cell::Null),
        any::<bool>().prop_map(Cell::Bool),
        (-1_000_000i64..1_000_000).prop_map(|n| Cell::Number(n as f64)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Cell::Text),
    ]
}

fn arb_table() -> impl Strategy<Value = Table> {
    // three fixed columns, up to 40 rows of mixed cells
    proptest::collection::vec(
        (arb_cell(), arb_cell(), arb_cell()).prop_map(|(a, b, c)| vec![a, b, c]),
        0..40,
    )
    .prop_map(|rows| {
        Table::new(vec!["a".into(), "b".into(), "c".into()], rows).unwrap()
    })
}

proptest! {
    #[test]
    fn sort_is_idempotent(table in arb_table()) {
        let keys = [SortKey::asc("a"), SortKey::desc("b")];
        let once = sort(&table, &keys);
        let twice = sort(&once, &keys);
        prop_assert_eq!(once.rows(), twice.rows());
    }

    #[test]
    fn filter_is_idempotent(table in arb_table()) {
        let pred = Predicate::leaf("b", FilterOp::GreaterThan, 0.into());
        let once = filter(&table, &pred);
        let twice = filter(&once, &pred);
        prop_assert_eq!(once.rows(), twice.rows());
    }

    #[test]
    fn operators_preserve_invariants(table in arb_table()) {
        let out = sort(
            &filter(&table, &Predicate::null_check("c", FilterOp::IsNotNull)),
            &[SortKey::asc("a")],
        );
        prop_assert!(out.validate().is_ok());
        prop_assert_eq!(out.meta.row_count, out.rows().len());
        for row in out.rows() {
            prop_assert_eq!(row.len(), out.columns().len());
        }
    }

    #[test]
    fn filter_output_is_subsequence(table in arb_table()) {
        let pred = Predicate::leaf("a", FilterOp::LessOrEqual, 0.into());
        let out = filter(&table, &pred);
        // every output row appears in the input, in order
        let mut cursor = 0usize;
        for row in out.rows() {
            let found = table.rows()[cursor..]
                .iter()
                .position(|r| r == row)
                .map(|p| p + cursor);
            prop_assert!(found.is_some());
            cursor = found.unwrap() + 1;
        }
    }

    #[test]
    fn slice_bounds_never_panic(table in arb_table(), start in 0usize..64, len in 0usize..64) {
        let out = slice(&table, start, Some(start + len));
        prop_assert!(out.row_count() <= len);
        prop_assert!(out.validate().is_ok());
    }
}
