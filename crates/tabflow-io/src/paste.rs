//! Pasted-text ingestion: tab-separated table grids (the shape spreadsheet
//! apps put on the clipboard), CSV, or JSON.

use serde::{Deserialize, Serialize};

use tabflow_table::{Table, TableOrigin};

use crate::csv::{CsvReadOptions, parse_csv};
use crate::error::IoError;
use crate::json::parse_json;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasteFormat {
    /// Tab-delimited grid with a header row.
    Table,
    Csv,
    Json,
}

/// Parse pasted text according to the declared format.
pub fn parse_pasted(text: &str, format: PasteFormat) -> Result<Table, IoError> {
    let table = match format {
        PasteFormat::Table => parse_csv(text, &CsvReadOptions::tsv())?,
        PasteFormat::Csv => parse_csv(text, &CsvReadOptions::default())?,
        PasteFormat::Json => parse_json(text)?,
    };
    Ok(table.with_origin(TableOrigin::Paste))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_common::Cell;

    #[test]
    fn spreadsheet_grid() {
        let table = parse_pasted("name\tage\nAlice\t30\nBob\t25\n", PasteFormat::Table).unwrap();
        assert_eq!(table.columns(), &["name".to_string(), "age".into()]);
        assert_eq!(table.rows()[0][1], Cell::Number(30.0));
        assert_eq!(table.meta.origin, Some(TableOrigin::Paste));
    }

    #[test]
    fn csv_subtype_handles_quoting() {
        let table = parse_pasted("a,b\n\"1,5\",2\n", PasteFormat::Csv).unwrap();
        assert_eq!(table.rows()[0][0], Cell::Text("1,5".into()));
    }

    #[test]
    fn json_subtype() {
        let table = parse_pasted(r#"[{"x": 1}, {"x": 2}]"#, PasteFormat::Json).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.meta.origin, Some(TableOrigin::Paste));
    }

    #[test]
    fn malformed_json_reports_line() {
        let err = parse_pasted("[{\"x\": }]", PasteFormat::Json).unwrap_err();
        assert!(matches!(err, IoError::ParseAt { .. }));
    }
}
