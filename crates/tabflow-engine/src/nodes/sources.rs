//! Source nodes: example datasets, file input, pasted text, HTTP.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use tabflow_common::{AppError, Cell};
use tabflow_io::{
    CsvReadOptions, HttpOptions, PasteFormat, fetch_table, parse_pasted, read_csv_file,
    read_json_file,
};
use tabflow_table::{Table, TableOrigin};

use crate::executor::{
    ExecutionContext, NodeCaps, NodeExecutor, NodeValue, ValidationResult,
};

/* ───────────────────────── example-data ───────────────────────── */

#[derive(Debug)]
pub struct ExampleDataNode;

#[derive(Debug, Deserialize)]
struct ExampleDataConfig {
    #[serde(default = "default_dataset")]
    dataset: String,
}

fn default_dataset() -> String {
    "employees".to_string()
}

const DATASETS: [&str; 3] = ["employees", "cities", "sales"];

impl NodeExecutor for ExampleDataNode {
    fn node_type(&self) -> &'static str {
        "example-data"
    }

    fn caps(&self) -> NodeCaps {
        NodeCaps::SOURCE
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        match ctx.config_as::<ExampleDataConfig>() {
            Ok(config) if DATASETS.contains(&config.dataset.as_str()) => ValidationResult::ok(),
            Ok(config) => ValidationResult::invalid(
                "dataset",
                &format!(
                    "unknown dataset '{}'; expected one of {DATASETS:?}",
                    config.dataset
                ),
                "UNKNOWN_DATASET",
            ),
            Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: ExampleDataConfig = ctx.config_as()?;
        let table = match config.dataset.as_str() {
            "employees" => employees(),
            "cities" => cities(),
            "sales" => sales(),
            other => {
                return Err(AppError::validation(format!("unknown dataset '{other}'"))
                    .with_field("dataset"));
            }
        };
        Ok(NodeValue::Table(table.with_origin(TableOrigin::Example)))
    }
}

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
    .expect("static dataset is well-formed")
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
    .expect("static dataset is well-formed")
}

fn sales() -> Table {
    Table::new(
        vec!["city".into(), "quarter".into(), "amount".into()],
        vec![
            vec!["NY".into(), "Q1".into(), 120_000.into()],
            vec!["NY".into(), "Q2".into(), 135_000.into()],
            vec!["LA".into(), "Q1".into(), 98_000.into()],
            vec!["LA".into(), "Q2".into(), 110_000.into()],
            vec!["Chicago".into(), "Q1".into(), 87_000.into()],
            vec!["Chicago".into(), "Q2".into(), Cell::Null],
        ],
    )
    .expect("static dataset is well-formed")
}

/* ───────────────────────── file-input ───────────────────────── */

#[derive(Debug)]
pub struct FileInputNode;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInputConfig {
    path: String,
    /// csv | tsv | json; inferred from the extension when omitted.
    #[serde(default)]
    format: Option<String>,
    #[serde(default = "default_true")]
    has_headers: bool,
    #[serde(default)]
    delimiter: Option<char>,
    #[serde(default = "default_true")]
    skip_empty_lines: bool,
    #[serde(default)]
    max_rows: Option<usize>,
}

fn default_true() -> bool {
    true
}

const FILE_FORMATS: [&str; 3] = ["csv", "tsv", "json"];

impl FileInputConfig {
    fn resolved_format(&self) -> Option<String> {
        if let Some(format) = &self.format {
            return Some(format.to_lowercase());
        }
        PathBuf::from(&self.path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

impl NodeExecutor for FileInputNode {
    fn node_type(&self) -> &'static str {
        "file-input"
    }

    fn caps(&self) -> NodeCaps {
        NodeCaps::SOURCE | NodeCaps::EXTERNAL
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        let config: FileInputConfig = match ctx.config_as() {
            Ok(config) => config,
            Err(e) => return ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        };
        let mut result = ValidationResult::ok();
        if config.path.trim().is_empty() {
            result.push_error("path", "path is required", "MISSING_FIELD");
        }
        match config.resolved_format() {
            Some(format) if FILE_FORMATS.contains(&format.as_str()) => {}
            Some(format) => result.push_error(
                "format",
                &format!("unsupported format '{format}'; expected one of {FILE_FORMATS:?}"),
                "UNSUPPORTED_FORMAT",
            ),
            None => result.push_error(
                "format",
                "format not given and not inferrable from the path",
                "MISSING_FIELD",
            ),
        }
        result
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        ctx.check_cancelled()?;
        let config: FileInputConfig = ctx.config_as()?;
        let path = PathBuf::from(&config.path);
        let format = config.resolved_format().unwrap_or_default();

        let table = match format.as_str() {
            "json" => read_json_file(&path)?,
            "csv" | "tsv" => {
                let mut options = if format == "tsv" {
                    CsvReadOptions::tsv()
                } else {
                    CsvReadOptions::default()
                };
                options.has_headers = config.has_headers;
                options.skip_empty_lines = config.skip_empty_lines;
                options.max_rows = config.max_rows;
                if let Some(delimiter) = config.delimiter {
                    options.delimiter = delimiter as u8;
                }
                read_csv_file(&path, &options)?
            }
            other => {
                return Err(AppError::file(format!("unsupported format '{other}'"))
                    .with_field("format"));
            }
        };
        ctx.check_cancelled()?;
        Ok(NodeValue::Table(table))
    }
}

/* ───────────────────────── paste-input ───────────────────────── */

#[derive(Debug)]
pub struct PasteInputNode;

#[derive(Debug, Deserialize)]
struct PasteInputConfig {
    text: String,
    #[serde(default = "default_paste_format")]
    format: PasteFormat,
}

fn default_paste_format() -> PasteFormat {
    PasteFormat::Csv
}

impl NodeExecutor for PasteInputNode {
    fn node_type(&self) -> &'static str {
        "paste-input"
    }

    fn caps(&self) -> NodeCaps {
        NodeCaps::SOURCE
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        match ctx.config_as::<PasteInputConfig>() {
            Ok(config) if config.text.trim().is_empty() => {
                ValidationResult::invalid("text", "pasted text is empty", "MISSING_FIELD")
            }
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        let config: PasteInputConfig = ctx.config_as()?;
        let table = parse_pasted(&config.text, config.format)?;
        Ok(NodeValue::Table(table))
    }
}

/* ───────────────────────── http-request ───────────────────────── */

#[derive(Debug)]
pub struct HttpRequestNode;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequestConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default = "default_http_timeout_ms")]
    timeout_ms: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

impl NodeExecutor for HttpRequestNode {
    fn node_type(&self) -> &'static str {
        "http-request"
    }

    fn caps(&self) -> NodeCaps {
        NodeCaps::SOURCE | NodeCaps::EXTERNAL
    }

    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
        let config: HttpRequestConfig = match ctx.config_as() {
            Ok(config) => config,
            Err(e) => return ValidationResult::invalid("config", &e.message, "INVALID_CONFIG"),
        };
        let mut result = ValidationResult::ok();
        let url = config.url.trim().to_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            result.push_error("url", "url must start with http:// or https://", "INVALID_URL");
        }
        if !METHODS.contains(&config.method.to_uppercase().as_str()) {
            result.push_error(
                "method",
                &format!("unsupported method '{}'", config.method),
                "INVALID_METHOD",
            );
        }
        if !(1_000..=60_000).contains(&config.timeout_ms) {
            result.push_warning(
                "timeoutMs",
                "timeout outside 1-60s is clamped",
                "CLAMPED",
            );
        }
        result
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError> {
        ctx.check_cancelled()?;
        let config: HttpRequestConfig = ctx.config_as()?;

        // Respect both the configured request timeout and the engine's
        // remaining task budget.
        let mut timeout = Duration::from_millis(config.timeout_ms);
        if let Some(remaining) = ctx.remaining_time() {
            timeout = timeout.min(remaining.max(Duration::from_secs(1)));
        }

        let mut options = HttpOptions::default()
            .with_method(config.method.clone())
            .with_timeout(timeout);
        options.headers = config.headers.clone();
        options.body = config.body.clone();

        let table = fetch_table(&config.url, &options)?;
        ctx.check_cancelled()?;
        Ok(NodeValue::Table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::run_node;
    use serde_json::json;

    #[test]
    fn example_data_emits_named_dataset() {
        let ctx = ExecutionContext::new("src", json!({ "dataset": "employees" }));
        let result = run_node(&ExampleDataNode, &ctx);
        assert!(result.success);
        let value = result.output.unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table.row_count(), 5);
        assert_eq!(table.meta.origin, Some(TableOrigin::Example));
    }

    #[test]
    fn example_data_rejects_unknown_dataset() {
        let ctx = ExecutionContext::new("src", json!({ "dataset": "unicorns" }));
        let result = run_node(&ExampleDataNode, &ctx);
        assert!(!result.success);
        let error = result.error.unwrap();
        assert_eq!(error.field.as_deref(), Some("dataset"));
    }

    #[test]
    fn file_input_reads_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,x\n2,y\n").unwrap();

        let ctx = ExecutionContext::new(
            "file",
            json!({ "path": path.display().to_string() }),
        );
        let result = run_node(&FileInputNode, &ctx);
        assert!(result.success, "error: {:?}", result.error);
        let value = result.output.unwrap();
        assert_eq!(value.as_table().unwrap().row_count(), 2);
    }

    #[test]
    fn file_input_validates_format() {
        let ctx = ExecutionContext::new("file", json!({ "path": "data.xlsx" }));
        let validation = FileInputNode.validate(&ctx);
        assert!(!validation.valid);
        assert_eq!(validation.errors[0].field, "format");
    }

    #[test]
    fn paste_input_parses_grid() {
        let ctx = ExecutionContext::new(
            "paste",
            json!({ "text": "a\tb\n1\t2\n", "format": "table" }),
        );
        let result = run_node(&PasteInputNode, &ctx);
        assert!(result.success);
        let value = result.output.unwrap();
        assert_eq!(
            value.as_table().unwrap().meta.origin,
            Some(TableOrigin::Paste)
        );
    }

    #[test]
    fn http_request_validates_scheme() {
        let ctx = ExecutionContext::new("http", json!({ "url": "ftp://example.com" }));
        let validation = HttpRequestNode.validate(&ctx);
        assert!(!validation.valid);
        assert_eq!(validation.errors[0].code, "INVALID_URL");
    }
}
