//! Transform nodes wrapping the table operator library.

use serde::Deserialize;

use tabflow_common::AppError;
use tabflow_table::Table;
use tabflow_table::ops::{
    GroupConfig, JoinConfig, Predicate, SortKey, filter, group, join, slice, sort,
};

use crate::executor::{
    ExecutionContext, NodeCaps, NodeExecutor, NodeValue, ValidationResult,
};

/// Shared shape of validate() for transforms whose config deserializes
/// into an operator configuration.
fn validate_config<T: serde::de::DeserializeOwned>(ctx: &ExecutionContext) -> ValidationResult {
    match ctx.config_as::<T>() {
        Ok(_) => ValidationResult::ok(),
        Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
    }
}

/* ───────────────────────── filter ───────────────────────── */

#[derive(Debug)]
pub struct FilterNode;

#[derive(Debug, Deserialize)]
struct FilterNodeConfig {
    predicate: Predicate,
}

impl NodeExecutor for FilterNode {
    fn node_type(&self) -> &'static str {
        "filter"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        validate_config::<FilterNodeConfig>(ctx)
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: FilterNodeConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(filter(table, &config.predicate)))
    }
}

/* ───────────────────────── sort ───────────────────────── */

#[derive(Debug)]
pub struct SortNode;

#[derive(Debug, Deserialize)]
struct SortNodeConfig {
    keys: Vec<SortKey>,
}

impl NodeExecutor for SortNode {
    fn node_type(&self) -> &'static str {
        "sort"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        let config: SortNodeConfig = match ctx.config_as() {
            Ok(config) => config,
            Err(e) => return ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        };
        let mut result = ValidationResult::ok();
        if config.keys.is_empty() {
            result.push_warning("keys", "no sort keys configured; output equals input", "EMPTY");
        }
        result
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: SortNodeConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(sort(table, &config.keys)))
    }
}

/* ───────────────────────── group ───────────────────────── */

#[derive(Debug)]
pub struct GroupNode;

impl NodeExecutor for GroupNode {
    fn node_type(&self) -> &'static str {
        "group"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        let config: GroupConfig = match ctx.config_as() {
            Ok(config) => config,
            Err(e) => return ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        };
        let mut result = ValidationResult::ok();
        if config.aggregations.is_empty() {
            result.push_warning(
                "aggregations",
                "no aggregations configured; output has group columns only",
                "EMPTY",
            );
        }
        result
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: GroupConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(group(table, &config)?))
    }
}

/* ───────────────────────── join ───────────────────────── */

#[derive(Debug)]
pub struct JoinNode;

impl JoinNode {
    /// Pick the two input tables: named `left`/`right` ports when the
    /// edges declare them, otherwise the first two inputs in port order.
    fn input_pair<'a>(ctx: &'a ExecutionContext) -> Result<(&'a Table, &'a Table), AppError> {
        let named = (ctx.input_named("left"), ctx.input_named("right"));
        let (left, right) = match named {
            (Some(left), Some(right)) => (left, right),
            _ => {
                if ctx.inputs.len() < 2 {
                    return Err(AppError::data("Join requires two upstream inputs")
                        .with_code(tabflow_common::codes::MISSING_INPUT)
                        .with_node(&ctx.node_id));
                }
                (ctx.inputs[0].value.as_ref(), ctx.inputs[1].value.as_ref())
            }
        };
        match (left.as_table(), right.as_table()) {
            (Some(left), Some(right)) => Ok((left, right)),
            _ => Err(AppError::data("Join inputs must be tables").with_node(&ctx.node_id)),
        }
    }
}

impl NodeExecutor for JoinNode {
    fn node_type(&self) -> &'static str {
        "join"
    }

    fn caps(&self) -> NodeCaps {
        NodeCaps::MULTI_INPUT
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        validate_config::<JoinConfig>(ctx)
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: JoinConfig = ctx.config_as()?;
        let (left, right) = Self::input_pair(ctx)?;
        Ok(NodeValue::Table(join(left, right, &config)?))
    }
}

/* ───────────────────────── slice ───────────────────────── */

#[derive(Debug)]
pub struct SliceNode;

#[derive(Debug, Deserialize)]
struct SliceNodeConfig {
    #[serde(default)]
    start: usize,
    #[serde(default)]
    end: Option<usize>,
}

impl NodeExecutor for SliceNode {
    fn node_type(&self) -> &'static str {
        "slice"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        let config: SliceNodeConfig = match ctx.config_as() {
            Ok(config) => config,
            Err(e) => return ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        };
        let mut result = ValidationResult::ok();
        if let Some(end) = config.end {
            if end < config.start {
                result.push_error("end", "end must not precede start", "INVALID_RANGE");
            }
        }
        result
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: SliceNodeConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(slice(table, config.start, config.end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::run_node;
    use serde_json::json;
    use tabflow_common::Cell;

    fn people() -> Table {
        Table::new(
            vec!["name".into(), "age".into()],
            vec![
                vec!["Alice".into(), 30.into()],
                vec!["Bob".into(), 25.into()],
                vec!["Carol".into(), 35.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn filter_node_end_to_end() {
        let ctx = ExecutionContext::new(
            "f",
            json!({ "predicate": { "column": "age", "operator": "greater_than", "value": 26 } }),
        )
        .with_input("src", NodeValue::Table(people()));

        let result = run_node(&FilterNode, &ctx);
        assert!(result.success, "error: {:?}", result.error);
        let value = result.output.unwrap();
        assert_eq!(value.as_table().unwrap().row_count(), 2);
    }

    #[test]
    fn filter_node_requires_input() {
        let ctx = ExecutionContext::new(
            "f",
            json!({ "predicate": { "column": "age", "operator": "is_null" } }),
        );
        let result = run_node(&FilterNode, &ctx);
        assert!(!result.success);
        assert!(result.error.unwrap().has_code(tabflow_common::codes::MISSING_INPUT));
    }

    #[test]
    fn sort_node_with_keys() {
        let ctx = ExecutionContext::new(
            "s",
            json!({ "keys": [ { "column": "age", "direction": "desc" } ] }),
        )
        .with_input("src", NodeValue::Table(people()));

        let result = run_node(&SortNode, &ctx);
        assert!(result.success);
        let value = result.output.unwrap();
        assert_eq!(value.as_table().unwrap().rows()[0][0], "Carol".into());
    }

    #[test]
    fn group_node_unknown_column_is_data_error() {
        let ctx = ExecutionContext::new(
            "g",
            json!({ "groupColumns": ["ghost"], "aggregations": [] }),
        )
        .with_input("src", NodeValue::Table(people()));

        let result = run_node(&GroupNode, &ctx);
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.has_code(tabflow_common::codes::UNKNOWN_COLUMN));
        assert_eq!(error.node_id.as_deref(), Some("g"));
    }

    #[test]
    fn join_node_uses_named_ports() {
        let right = Table::new(
            vec!["name".into(), "team".into()],
            vec![vec!["Alice".into(), "core".into()]],
        )
        .unwrap();

        let ctx = ExecutionContext::new(
            "j",
            json!({ "type": "left", "leftKey": "name", "rightKey": "name" }),
        )
        .with_port_input("a", "left", NodeValue::Table(people()))
        .with_port_input("b", "right", NodeValue::Table(right));

        let result = run_node(&JoinNode, &ctx);
        assert!(result.success, "error: {:?}", result.error);
        let value = result.output.unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[0][2], "core".into());
        assert_eq!(table.rows()[1][2], Cell::Null);
    }

    #[test]
    fn join_node_requires_two_inputs() {
        let ctx = ExecutionContext::new(
            "j",
            json!({ "type": "inner", "leftKey": "name", "rightKey": "name" }),
        )
        .with_input("a", NodeValue::Table(people()));
        let result = run_node(&JoinNode, &ctx);
        assert!(!result.success);
    }

    #[test]
    fn slice_node_range() {
        let ctx = ExecutionContext::new("s", json!({ "start": 1, "end": 2 }))
            .with_input("src", NodeValue::Table(people()));
        let result = run_node(&SliceNode, &ctx);
        assert!(result.success);
        let value = result.output.unwrap();
        assert_eq!(value.as_table().unwrap().rows()[0][0], "Bob".into());
    }

    #[test]
    fn slice_node_rejects_inverted_range() {
        let ctx = ExecutionContext::new("s", json!({ "start": 5, "end": 2 }));
        let validation = SliceNode.validate(&ctx);
        assert!(!validation.valid);
    }
}
