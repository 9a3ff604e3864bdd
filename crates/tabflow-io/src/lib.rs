//! Import/export backends for tabflow tables.
//!
//! Parsers produce [`tabflow_table::Table`]s with origin metadata attached;
//! exporters render tables to CSV/TSV or JSON. Backend-local failures are
//! an [`IoError`] and convert into the workspace [`AppError`] envelope at
//! the crate boundary.

pub mod csv;
pub mod error;
pub mod http;
pub mod json;
pub mod paste;

pub use self::csv::{
    CsvReadOptions, CsvWriteOptions, export_csv, export_tsv, parse_csv, read_csv_file,
};
pub use self::error::IoError;
pub use self::http::{HttpOptions, fetch_table};
pub use self::json::{export_json_objects, export_json_table, parse_json, read_json_file};
pub use self::paste::{PasteFormat, parse_pasted};

/// Hard cap for interactive file ingestion.
pub const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;
