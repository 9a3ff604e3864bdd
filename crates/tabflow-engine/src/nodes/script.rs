//! The script node: evaluates a user expression against the input table
//! under the engine's time budget.
//!
//! Expressions run in the purpose-built language from [`crate::expr`] —
//! sandboxed by construction, with no visibility into the host process.

use serde::Deserialize;

use tabflow_common::{AppError, Cell};
use tabflow_table::Table;

use crate::executor::{ExecutionContext, NodeExecutor, NodeValue, ValidationResult};
use crate::expr::{self, EvalLimits, Evaluator};

#[derive(Debug)]
pub struct ScriptNode;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum ScriptMode {
    /// Evaluate per row and write the result into a target column.
    #[default]
    Map,
    /// Evaluate once against the whole table; the output is a 1×1 table.
    Scalar,
}

#[derive(Debug, Deserialize)]
struct ScriptNodeConfig {
    expression: String,
    #[serde(default)]
    mode: ScriptMode,
    #[serde(default = "default_target")]
    target: String,
}

fn default_target() -> String {
    "result".to_string()
}

impl NodeExecutor for ScriptNode {
    fn node_type(&self) -> &'static str {
        "script"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        let config: ScriptNodeConfig = match ctx.config_as() {
            Ok(config) => config,
            Err(e) => return ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        };
        let mut result = ValidationResult::ok();
        if config.target.trim().is_empty() {
            result.push_error("target", "target column name is empty", "MISSING_FIELD");
        }
        if let Err(e) = expr::parse(&config.expression) {
            result.push_error("expression", &e.message, "PARSE_ERROR");
        }
        result
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: ScriptNodeConfig = ctx.config_as()?;
        let expression = expr::parse(&config.expression)?;
        let table = ctx.input_table()?;

        let limits = EvalLimits {
            deadline: ctx.deadline,
            cancel: ctx.cancel.clone(),
        };
        let evaluator = Evaluator::new(table, limits);

        match config.mode {
            ScriptMode::Scalar => {
                let value = evaluator.eval_scalar(&expression)?;
                let out = Table::new(vec![config.target], vec![vec![value]])?;
                Ok(NodeValue::Table(out))
            }
            ScriptMode::Map => {
                let mut values = Vec::with_capacity(table.row_count());
                for row in 0..table.row_count() {
                    values.push(evaluator.eval_row(&expression, row)?);
                }
                Ok(NodeValue::Table(write_column(table, &config.target, values)))
            }
        }
    }
}

/// Append the computed column, or overwrite it in place when the target
/// name already exists (re-running a script node must not error on its own
/// previous output).
fn write_column(table: &Table, target: &str, values: Vec<Cell>) -> Table {
    match table.column_index(target) {
        Ok(index) => {
            let rows = table
                .rows()
                .iter()
                .zip(values)
                .map(|(row, value)| {
                    let mut row = row.clone();
                    row[index] = value;
                    row
                })
                .collect();
            table.derive_rows(rows)
        }
        Err(_) => {
            let mut columns = table.columns().to_vec();
            columns.push(target.to_string());
            let rows = table
                .rows()
                .iter()
                .zip(values)
                .map(|(row, value)| {
                    let mut row = row.clone();
                    row.push(value);
                    row
                })
                .collect();
            table.derive(columns, rows)
        }
    }
}
