//! Cleaning nodes: fill-missing, outlier removal, normalization, sampling.

use serde::Deserialize;

use tabflow_common::AppError;
use tabflow_table::ops::{
    FillStrategy, NormalizeMethod, OutlierMethod, SampleConfig, fill_missing, normalize,
    remove_outliers, sample,
};

use crate::executor::{ExecutionContext, NodeExecutor, NodeValue, ValidationResult};

/* ───────────────────────── fill-missing ───────────────────────── */

#[derive(Debug)]
pub struct FillMissingNode;

#[derive(Debug, Deserialize)]
struct FillMissingConfig {
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(flatten)]
    strategy: FillStrategy,
}

impl NodeExecutor for FillMissingNode {
    fn node_type(&self) -> &'static str {
        "fill-missing"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        match ctx.config_as::<FillMissingConfig>() {
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: FillMissingConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        let out = fill_missing(table, config.columns.as_deref(), &config.strategy)?;
        Ok(NodeValue::Table(out))
    }
}

/* ───────────────────────── remove-outliers ───────────────────────── */

#[derive(Debug)]
pub struct RemoveOutliersNode;

#[derive(Debug, Deserialize)]
struct RemoveOutliersConfig {
    column: String,
    #[serde(flatten)]
    method: OutlierMethod,
}

impl NodeExecutor for RemoveOutliersNode {
    fn node_type(&self) -> &'static str {
        "remove-outliers"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        match ctx.config_as::<RemoveOutliersConfig>() {
            Ok(config) if config.column.trim().is_empty() => {
                ValidationResult::invalid("column", "column is required", "MISSING_FIELD")
            }
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: RemoveOutliersConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(remove_outliers(
            table,
            &config.column,
            config.method,
        )?))
    }
}

/* ───────────────────────── normalize ───────────────────────── */

#[derive(Debug)]
pub struct NormalizeNode;

#[derive(Debug, Deserialize)]
struct NormalizeConfig {
    columns: Vec<String>,
    method: NormalizeMethod,
}

impl NodeExecutor for NormalizeNode {
    fn node_type(&self) -> &'static str {
        "normalize"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        match ctx.config_as::<NormalizeConfig>() {
            Ok(config) if config.columns.is_empty() => {
                ValidationResult::invalid("columns", "at least one column", "MISSING_FIELD")
            }
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: NormalizeConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(normalize(
            table,
            &config.columns,
            config.method,
        )?))
    }
}

/* ───────────────────────── sample ───────────────────────── */

#[derive(Debug)]
pub struct SampleNode;

impl NodeExecutor for SampleNode {
    fn node_type(&self) -> &'static str {
        "sample"
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        match ctx.config_as::<SampleConfig>() {
            Ok(config) if config.size == 0 => {
                ValidationResult::invalid("size", "sample size must be positive", "INVALID_RANGE")
            }
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: SampleConfig = ctx.config_as()?;
        let table = ctx.input_table()?;
        Ok(NodeValue::Table(sample(table, &config)?))
    }
}
