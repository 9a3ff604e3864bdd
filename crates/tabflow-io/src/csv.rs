//! CSV/TSV reading and writing.
//!
//! Quoting follows RFC 4180: the quote character is escaped by doubling,
//! and any field containing the delimiter, the quote, CR, or LF is quoted.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tabflow_common::Cell;
use tabflow_table::{Table, TableOrigin};

use crate::MAX_FILE_BYTES;
use crate::error::IoError;

#[derive(Clone, Debug)]
pub struct CsvReadOptions {
    /// Field delimiter as a single byte. Use `b'\t'` for TSV.
    pub delimiter: u8,
    pub quote: u8,
    /// When true, the first record supplies column names; otherwise columns
    /// are synthesized as `column_1..column_n`.
    pub has_headers: bool,
    pub skip_empty_lines: bool,
    /// Stop after this many data rows.
    pub max_rows: Option<usize>,
    /// Fields equal to this marker parse as null (empty fields always do).
    pub null_marker: Option<String>,
    /// Parse numbers and booleans into typed cells.
    pub infer_types: bool,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_headers: true,
            skip_empty_lines: true,
            max_rows: None,
            null_marker: None,
            infer_types: true,
        }
    }
}

impl CsvReadOptions {
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }
}

#[derive(Clone, Debug)]
pub struct CsvWriteOptions {
    /// Field delimiter as a single byte. Use `b'\t'` for TSV.
    pub delimiter: u8,
    pub quote: u8,
    pub include_header: bool,
    /// Written for null cells.
    pub null_marker: String,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            include_header: true,
            null_marker: String::new(),
        }
    }
}

/// Parse CSV text into a table.
pub fn parse_csv(text: &str, options: &CsvReadOptions) -> Result<Table, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Cell>> = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if options.skip_empty_lines && record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        if columns.is_empty() {
            if options.has_headers {
                columns = record
                    .iter()
                    .enumerate()
                    .map(|(j, name)| {
                        let name = name.trim();
                        if name.is_empty() {
                            format!("column_{}", j + 1)
                        } else {
                            name.to_string()
                        }
                    })
                    .collect();
                continue;
            }
            columns = (1..=record.len()).map(|j| format!("column_{j}")).collect();
        }

        if let Some(max) = options.max_rows {
            if rows.len() >= max {
                break;
            }
        }

        let mut row: Vec<Cell> = record
            .iter()
            .take(columns.len())
            .map(|field| parse_field(field, options))
            .collect();
        if row.len() < columns.len() {
            row.resize(columns.len(), Cell::Null);
        } else if record.len() > columns.len() {
            return Err(IoError::ParseAt {
                line: i + 1,
                message: format!(
                    "record has {} fields, expected {}",
                    record.len(),
                    columns.len()
                ),
            });
        }
        rows.push(row);
    }

    dedupe_columns(&mut columns);
    Table::new(columns, rows)
        .map(|t| t.with_origin(TableOrigin::File))
        .map_err(|e| IoError::Parse(e.message))
}

/// Read and parse a CSV file, enforcing the interactive size cap.
pub fn read_csv_file(path: &Path, options: &CsvReadOptions) -> Result<Table, IoError> {
    let text = read_capped(path)?;
    let mut table = parse_csv(&text, options)?;
    table.meta.source = Some(tabflow_table::SourceInfo {
        path: Some(path.display().to_string()),
        ..Default::default()
    });
    Ok(table)
}

pub(crate) fn read_capped(path: &Path) -> Result<String, IoError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size > MAX_FILE_BYTES {
        return Err(IoError::TooLarge {
            size,
            cap: MAX_FILE_BYTES,
        });
    }
    let mut text = String::with_capacity(size as usize);
    std::io::BufReader::new(file).read_to_string(&mut text)?;
    Ok(text)
}

fn parse_field(field: &str, options: &CsvReadOptions) -> Cell {
    if field.is_empty() {
        return Cell::Null;
    }
    if let Some(marker) = &options.null_marker {
        if field == marker {
            return Cell::Null;
        }
    }
    if options.infer_types {
        let trimmed = field.trim();
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Cell::Number(n);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => return Cell::Bool(true),
            "false" => return Cell::Bool(false),
            _ => {}
        }
    }
    Cell::Text(field.to_string())
}

/// Column names must be unique; repeated headers get a numeric suffix.
fn dedupe_columns(columns: &mut [String]) {
    use std::collections::HashMap;
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in columns.iter_mut() {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            *name = format!("{name}_{count}");
        }
    }
}

/// Render a table as CSV.
pub fn export_csv(table: &Table, options: &CsvWriteOptions) -> Result<String, IoError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .from_writer(Vec::new());

    if options.include_header {
        writer.write_record(table.columns())?;
    }
    for row in table.rows() {
        let fields: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Cell::Null => options.null_marker.clone(),
                other => other.to_text(),
            })
            .collect();
        writer.write_record(&fields)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IoError::Parse(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| IoError::Parse(e.to_string()))
}

/// CSV with a tab delimiter.
pub fn export_tsv(table: &Table) -> Result<String, IoError> {
    export_csv(
        table,
        &CsvWriteOptions {
            delimiter: b'\t',
            ..Default::default()
        },
    )
}
