//! Shape nodes: pivot/unpivot/transpose and column-level edits.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use tabflow_common::AppError;
use tabflow_table::ops::{
    PivotConfig, UnpivotConfig, pivot, remove_columns, rename_columns, transpose, unpivot,
};

use crate::executor::{ExecutionContext, NodeExecutor, NodeValue, ValidationResult};

fn validate_config<T: serde::de::DeserializeOwned>(ctx: &ExecutionContext) -> ValidationResult {
    match ctx.config_as::<T>() {
        Ok(_) => ValidationResult::ok(),
        Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
    }
}

/* ───────────────────────── pivot / unpivot / transpose ───────────────────────── */

#[derive(Debug)]
pub struct PivotNode;

impl NodeExecutor for PivotNode {
    fn node_type(&self) -> &'static str {
        "pivot"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        validate_config::<PivotConfig>(ctx)
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: PivotConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(pivot(table, &config)?))
    }
}

#[derive(Debug)]
pub struct UnpivotNode;

impl NodeExecutor for UnpivotNode {
    fn node_type(&self) -> &'static str {
        "unpivot"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        validate_config::<UnpivotConfig>(ctx)
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: UnpivotConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(unpivot(table, &config)?))
    }
}

#[derive(Debug)]
pub struct TransposeNode;

impl NodeExecutor for TransposeNode {
    fn node_type(&self) -> &'static str {
        "transpose"
    }

    fn validate(&self, _ctx: &ExecutionContext) -> ValidationResult {
        ValidationResult::ok()
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(transpose(table)))
    }
}

/* ───────────────────────── column edits ───────────────────────── */

#[derive(Debug)]
pub struct RenameColumnsNode;

#[derive(Debug, Deserialize)]
struct RenameColumnsConfig {
    renames: FxHashMap<String, String>,
}

impl NodeExecutor for RenameColumnsNode {
    fn node_type(&self) -> &'static str {
        "rename-columns"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        match ctx.config_as::<RenameColumnsConfig>() {
            Ok(config) if config.renames.is_empty() => {
                let mut result = ValidationResult::ok();
                result.push_warning("renames", "no renames configured", "EMPTY");
                result
            }
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: RenameColumnsConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(rename_columns(table, &config.renames)?))
    }
}

#[derive(Debug)]
pub struct RemoveColumnsNode;

#[derive(Debug, Deserialize)]
struct RemoveColumnsConfig {
    columns: Vec<String>,
}

impl NodeExecutor for RemoveColumnsNode {
    fn node_type(&self) -> &'static str {
        "remove-columns"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        validate_config::<RemoveColumnsConfig>(ctx)
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: RemoveColumnsConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(remove_columns(table, &config.columns)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::run_node;
    use serde_json::json;
    use tabflow_common::Cell;
    use tabflow_table::Table;

    fn long() -> Table {
        Table::new(
            vec!["city".into(), "quarter".into(), "sales".into()],
            vec![
                vec!["NY".into(), "Q1".into(), 10.into()],
                vec!["NY".into(), "Q2".into(), 20.into()],
                vec!["LA".into(), "Q1".into(), 30.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn pivot_node_widens() {
        let ctx = ExecutionContext::new(
            "p",
            json!({
                "indexColumn": "city",
                "columnColumn": "quarter",
                "valueColumn": "sales",
                "aggregation": "sum"
            }),
        )
        .with_input("src", NodeValue::Table(long()));

        let result = run_node(&PivotNode, &ctx);
        assert!(result.success, "error: {:?}", result.error);
        let value = result.output.unwrap();
        let out = value.as_table().unwrap();
        assert_eq!(out.columns(), &["city".to_string(), "Q1".into(), "Q2".into()]);
        assert_eq!(out.rows()[1][2], Cell::Null); // LA has no Q2
    }

    #[test]
    fn unpivot_node_melts() {
        let wide = Table::new(
            vec!["city".into(), "Q1".into()],
            vec![vec!["NY".into(), 10.into()]],
        )
        .unwrap();
        let ctx = ExecutionContext::new("u", json!({ "idColumns": ["city"] }))
            .with_input("src", NodeValue::Table(wide));

        let result = run_node(&UnpivotNode, &ctx);
        assert!(result.success);
        let value = result.output.unwrap();
        assert_eq!(
            value.as_table().unwrap().columns(),
            &["city".to_string(), "variable".into(), "value".into()]
        );
    }

    #[test]
    fn transpose_node_needs_no_config() {
        let ctx = ExecutionContext::new("t", serde_json::Value::Null)
            .with_input("src", NodeValue::Table(long()));
        let result = run_node(&TransposeNode, &ctx);
        assert!(result.success);
        let value = result.output.unwrap();
        assert_eq!(value.as_table().unwrap().row_count(), 3);
    }

    #[test]
    fn rename_columns_node_propagates_duplicates() {
        let ctx = ExecutionContext::new(
            "r",
            json!({ "renames": { "sales": "city" } }),
        )
        .with_input("src", NodeValue::Table(long()));
        let result = run_node(&RenameColumnsNode, &ctx);
        assert!(!result.success);
        assert!(
            result
                .error
                .unwrap()
                .has_code(tabflow_common::codes::DUPLICATE_COLUMN)
        );
    }

    #[test]
    fn remove_columns_node_drops() {
        let ctx = ExecutionContext::new("r", json!({ "columns": ["quarter"] }))
            .with_input("src", NodeValue::Table(long()));
        let result = run_node(&RemoveColumnsNode, &ctx);
        assert!(result.success);
        let value = result.output.unwrap();
        assert_eq!(
            value.as_table().unwrap().columns(),
            &["city".to_string(), "sales".into()]
        );
    }
}
