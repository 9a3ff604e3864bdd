//! The chart node: validates axis selections and produces a render
//! description consumed by external chart renderers. No drawing happens in
//! the core.

use serde::{Deserialize, Serialize};

use tabflow_common::{AppError, Cell};
use tabflow_table::{ColumnType, Table};

use crate::executor::{
    ExecutionContext, NodeCaps, NodeExecutor, NodeValue, ValidationResult,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Pie,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(Cell, Cell)>,
}

/// The chart description value: everything a renderer needs, nothing it
/// doesn't.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group: Option<String>,
    pub series: Vec<Series>,
}

#[derive(Debug)]
pub struct ChartNode;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartNodeConfig {
    kind: ChartKind,
    x: String,
    y: String,
    #[serde(default)]
    group: Option<String>,
}

impl NodeExecutor for ChartNode {
    fn node_type(&self) -> &'static str {
        "chart"
    }

    fn caps(&self) -> NodeCaps {
        NodeCaps::SINK
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        let config: ChartNodeConfig = match ctx.config_as() {
            Ok(config) => config,
            Err(e) => return ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        };
        let mut result = ValidationResult::ok();
        if config.x.trim().is_empty() {
            result.push_error("x", "x axis column is required", "MISSING_FIELD");
        }
        if config.y.trim().is_empty() {
            result.push_error("y", "y axis column is required", "MISSING_FIELD");
        }
        result
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: ChartNodeConfig = ctx.config_as()?;
        let table = ctx.input_table()?;

        let x = table.column_index(&config.x)?;
        let y = table.column_index(&config.y)?;
        if table.column_type(&config.y) != Some(ColumnType::Number) {
            // Sparse or text-polluted y columns still render; points that
            // don't coerce are dropped below.
            tracing::debug!(column = %config.y, "y axis is not a numeric column");
        }

        let series = match &config.group {
            Some(group_column) => {
                let g = table.column_index(group_column)?;
                let mut names: Vec<String> = Vec::new();
                let mut buckets: Vec<Vec<(Cell, Cell)>> = Vec::new();
                for row in table.rows() {
                    let key = row[g].to_text();
                    let slot = match names.iter().position(|n| *n == key) {
                        Some(slot) => slot,
                        None => {
                            names.push(key);
                            buckets.push(Vec::new());
                            buckets.len() - 1
                        }
                    };
                    if let Some(point) = point(&row[x], &row[y]) {
                        buckets[slot].push(point);
                    }
                }
                names
                    .into_iter()
                    .zip(buckets)
                    .map(|(name, points)| Series { name, points })
                    .collect()
            }
            None => {
                let points = table
                    .rows()
                    .iter()
                    .filter_map(|row| point(&row[x], &row[y]))
                    .collect();
                vec![Series {
                    name: config.y.clone(),
                    points,
                }]
            }
        };

        Ok(NodeValue::Chart(ChartSpec {
            kind: config.kind,
            x: config.x,
            y: config.y,
            group: config.group,
            series,
        }))
    }
}

/// A plottable point: the y side must coerce to a number.
fn point(x: &Cell, y: &Cell) -> Option<(Cell, Cell)> {
    let value = y.coerce_number()?;
    Some((x.clone(), Cell::Number(value)))
}
