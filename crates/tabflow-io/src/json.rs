//! JSON import/export.
//!
//! Two shapes are supported: array-of-objects for data interchange (keys
//! are column names, in column order), and the structured
//! `{columns, rows, metadata}` form for round-trippable table state.

use std::path::Path;

use serde_json::{Map, Value, json};

use tabflow_common::Cell;
use tabflow_table::{Table, TableOrigin};

use crate::error::IoError;

/// Export as an array of objects, one per row, keys in column order.
pub fn export_json_objects(table: &Table) -> Value {
    let rows: Vec<Value> = table
        .rows()
        .iter()
        .map(|row| {
            let mut object = Map::with_capacity(table.column_count());
            for (name, cell) in table.columns().iter().zip(row) {
                object.insert(name.clone(), cell.into());
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}

/// Export the structured `{columns, rows, metadata}` form.
pub fn export_json_table(table: &Table) -> Result<Value, IoError> {
    Ok(json!({
        "columns": table.columns(),
        "rows": table.rows(),
        "metadata": serde_json::to_value(&table.meta)?,
    }))
}

/// Parse JSON text into a table.
///
/// Accepts an array of objects (column order = union of keys in first-seen
/// order), an array of arrays (synthesized column names), the structured
/// `{columns, rows}` form, or a single object (one-row table).
pub fn parse_json(text: &str) -> Result<Table, IoError> {
    let value: Value = serde_json::from_str(text)?;
    table_from_value(&value)
}

pub fn table_from_value(value: &Value) -> Result<Table, IoError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Table::new(Vec::new(), Vec::new())
                    .map(|t| t.with_origin(TableOrigin::File))
                    .map_err(|e| IoError::Parse(e.message));
            }
            if items.iter().all(Value::is_object) {
                let records: Vec<Vec<(String, Cell)>> = items
                    .iter()
                    .map(|item| {
                        item.as_object()
                            .unwrap()
                            .iter()
                            .map(|(k, v)| (k.clone(), Cell::from(v)))
                            .collect()
                    })
                    .collect();
                return Table::from_records(records)
                    .map(|t| t.with_origin(TableOrigin::File))
                    .map_err(|e| IoError::Parse(e.message));
            }
            if items.iter().all(Value::is_array) {
                let width = items
                    .iter()
                    .map(|r| r.as_array().unwrap().len())
                    .max()
                    .unwrap_or(0);
                let columns = (1..=width).map(|i| format!("column_{i}")).collect();
                let rows = items
                    .iter()
                    .map(|item| {
                        let mut row: Vec<Cell> =
                            item.as_array().unwrap().iter().map(Cell::from).collect();
                        row.resize(width, Cell::Null);
                        row
                    })
                    .collect();
                return Table::new(columns, rows)
                    .map(|t| t.with_origin(TableOrigin::File))
                    .map_err(|e| IoError::Parse(e.message));
            }
            // array of scalars → single column
            let rows = items.iter().map(|v| vec![Cell::from(v)]).collect();
            Table::new(vec!["value".to_string()], rows)
                .map(|t| t.with_origin(TableOrigin::File))
                .map_err(|e| IoError::Parse(e.message))
        }
        Value::Object(object) => {
            // structured form?
            if let (Some(Value::Array(columns)), Some(Value::Array(rows))) =
                (object.get("columns"), object.get("rows"))
            {
                let columns: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        c.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| IoError::Parse("column names must be strings".into()))
                    })
                    .collect::<Result<_, _>>()?;
                let rows: Vec<Vec<Cell>> = rows
                    .iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(Cell::from).collect())
                            .ok_or_else(|| IoError::Parse("rows must be arrays".into()))
                    })
                    .collect::<Result<_, _>>()?;
                return Table::new(columns, rows)
                    .map(|t| t.with_origin(TableOrigin::File))
                    .map_err(|e| IoError::Parse(e.message));
            }
            // single object → one-row table
            let record: Vec<(String, Cell)> = object
                .iter()
                .map(|(k, v)| (k.clone(), Cell::from(v)))
                .collect();
            Table::from_records(vec![record])
                .map(|t| t.with_origin(TableOrigin::File))
                .map_err(|e| IoError::Parse(e.message))
        }
        other => Err(IoError::Parse(format!(
            "cannot build a table from JSON {}",
            type_of(other)
        ))),
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read and parse a JSON file, enforcing the interactive size cap.
pub fn read_json_file(path: &Path) -> Result<Table, IoError> {
    let text = crate::csv::read_capped(path)?;
    let mut table = parse_json(&text)?;
    table.meta.source = Some(tabflow_table::SourceInfo {
        path: Some(path.display().to_string()),
        ..Default::default()
    });
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_round_trip_preserving_key_order() {
        let table = Table::new(
            vec!["z".into(), "a".into()],
            vec![
                vec![Cell::Number(1.0), Cell::Text("x".into())],
                vec![Cell::Null, Cell::Bool(true)],
            ],
        )
        .unwrap();

        let value = export_json_objects(&table);
        let back = table_from_value(&value).unwrap();
        assert_eq!(back.columns(), table.columns());
        assert_eq!(back.rows(), table.rows());
    }

    #[test]
    fn records_with_missing_keys_fill_null() {
        let table = parse_json(r#"[{"a": 1}, {"a": 2, "b": "x"}]"#).unwrap();
        assert_eq!(table.columns(), &["a".to_string(), "b".into()]);
        assert_eq!(table.rows()[0][1], Cell::Null);
    }

    #[test]
    fn array_of_arrays() {
        let table = parse_json(r#"[[1, 2], [3]]"#).unwrap();
        assert_eq!(table.columns(), &["column_1".to_string(), "column_2".into()]);
        assert_eq!(table.rows()[1][1], Cell::Null);
    }

    #[test]
    fn array_of_scalars_is_single_column() {
        let table = parse_json(r#"[1, 2, 3]"#).unwrap();
        assert_eq!(table.columns(), &["value".to_string()]);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn structured_form_round_trip() {
        let table = Table::new(
            vec!["a".into()],
            vec![vec![Cell::Number(1.5)], vec![Cell::Text("two".into())]],
        )
        .unwrap();
        let value = export_json_table(&table).unwrap();
        let back = table_from_value(&value).unwrap();
        assert_eq!(back.columns(), table.columns());
        assert_eq!(back.rows(), table.rows());
        assert!(value["metadata"]["rowCount"].is_number());
    }

    #[test]
    fn scalar_json_is_rejected() {
        assert!(parse_json("42").is_err());
        assert!(parse_json("\"just text\"").is_err());
    }

    #[test]
    fn nested_values_flatten_to_text() {
        let table = parse_json(r#"[{"a": {"deep": true}}]"#).unwrap();
        assert_eq!(table.rows()[0][0], Cell::Text("{\"deep\":true}".into()));
    }
}
