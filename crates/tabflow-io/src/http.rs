//! HTTP ingestion: fetch a URL and map the response to a table by content
//! type. Responses carry transport metadata (status, size, elapsed time,
//! method, url) in the table's source info.

use std::time::{Duration, Instant};

use tracing::debug;

use tabflow_common::{AppError, Cell, codes};
use tabflow_table::{SourceInfo, Table, TableOrigin};

use crate::csv::{CsvReadOptions, parse_csv};
use crate::json::table_from_value;

const MIN_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct HttpOptions {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Clamped to 1–60 seconds.
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpOptions {
    pub fn with_method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header<S: Into<String>>(mut self, name: S, value: S) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fetch a URL and build a table from the response.
///
/// JSON responses map through the JSON table builder, CSV responses
/// through the CSV parser, and anything else lands as a single text cell.
pub fn fetch_table(url: &str, options: &HttpOptions) -> Result<Table, AppError> {
    validate_url(url)?;

    let timeout = options.timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::network(format!("client setup failed: {e}")))?;

    let method = reqwest::Method::from_bytes(options.method.to_uppercase().as_bytes())
        .map_err(|_| {
            AppError::validation(format!("invalid http method '{}'", options.method))
                .with_field("method")
        })?;

    let mut request = client.request(method, url);
    for (name, value) in &options.headers {
        request = request.header(name, value);
    }
    if let Some(body) = &options.body {
        request = request.body(body.clone());
    }

    let started = Instant::now();
    let response = request
        .send()
        .map_err(|e| classify_transport_error(&e, timeout))?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    let body = response
        .text()
        .map_err(|e| AppError::network(format!("failed to read response body: {e}")))?;
    let elapsed = started.elapsed();

    debug!(url, status = status.as_u16(), bytes = body.len(), ?elapsed, "http fetch complete");

    if !status.is_success() {
        return Err(AppError::network(format!(
            "request to {url} failed with status {status}"
        ))
        .with_details(serde_json::json!({ "status": status.as_u16() })));
    }

    let mut table = body_to_table(&body, &content_type)?;
    table.meta.origin = Some(TableOrigin::Http);
    table.meta.source = Some(SourceInfo {
        url: Some(url.to_string()),
        method: Some(options.method.to_uppercase()),
        status: Some(status.as_u16()),
        content_type: Some(content_type),
        response_bytes: Some(body.len() as u64),
        elapsed_ms: Some(elapsed.as_millis() as u64),
        path: None,
    });
    Ok(table)
}

/// Only http and https are allowed; everything else (file, ftp, data, …)
/// is rejected before any request is made.
fn validate_url(url: &str) -> Result<(), AppError> {
    let lower = url.trim().to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        let rest = lower.split("://").nth(1).unwrap_or("");
        if !rest.is_empty() && !rest.starts_with('/') {
            return Ok(());
        }
    }
    Err(AppError::network(format!("invalid url '{url}': only http(s) is supported"))
        .with_code(codes::INVALID_URL))
}

fn classify_transport_error(e: &reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::network(format!(
            "request timed out after {}ms",
            timeout.as_millis()
        ))
        .with_code(codes::TIMEOUT)
    } else if e.is_connect() {
        AppError::network(format!("connection failed: {e}"))
    } else {
        AppError::network(e.to_string())
    }
}

fn body_to_table(body: &str, content_type: &str) -> Result<Table, AppError> {
    if content_type.contains("json") {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| AppError::from(crate::error::IoError::from(e)))?;
        return table_from_value(&value).map_err(AppError::from);
    }
    if content_type.contains("csv") {
        return parse_csv(body, &CsvReadOptions::default()).map_err(AppError::from);
    }
    // plain text (or unknown): a 1×1 table holding the body
    Ok(Table::new(
        vec!["text".to_string()],
        vec![vec![Cell::Text(body.to_string())]],
    )
    .expect("1x1 table is always valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_scheme_validation() {
        assert!(validate_url("https://example.com/data.json").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("example.com").is_err());
    }

    #[test]
    fn json_body_maps_to_table() {
        let table = body_to_table(r#"[{"a": 1}]"#, "application/json; charset=utf-8").unwrap();
        assert_eq!(table.columns(), &["a".to_string()]);
    }

    #[test]
    fn csv_body_maps_to_table() {
        let table = body_to_table("a,b\n1,2\n", "text/csv").unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn other_body_is_single_cell() {
        let table = body_to_table("hello", "text/plain").unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows()[0][0], Cell::Text("hello".into()));
    }
}
