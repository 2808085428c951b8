//! Object key listing from the input spreadsheet.
//!
//! The key file is the pipeline's source of truth for which objects exist.
//! Excel workbooks (`.xlsx`/`.xls`) and CSV files are both accepted; in
//! either case one named column holds the keys, rows are scanned in order,
//! and only values carrying the binary-format suffix are eligible.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::info;

/// Suffix an object key must carry to be eligible for download.
pub const KEY_SUFFIX: &str = ".bson";

/// Key listing errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Key file could not be read
    #[error("IO error: {0}")]
    IoError(String),

    /// Key file extension is not a supported format
    #[error("unsupported key file format: {0}")]
    UnsupportedFormat(String),

    /// Workbook could not be opened or decoded
    #[error("spreadsheet error: {0}")]
    SpreadsheetError(String),

    /// CSV file could not be decoded
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Named column is absent from the header row
    #[error("column not found: {0}")]
    ColumnNotFound(String),
}

/// List eligible object keys from `path`, reading the named `column`.
///
/// At most `limit` rows are scanned when given; ineligible values (empty
/// cells, values without the [`KEY_SUFFIX`]) are dropped silently, matching
/// the row order of the file. The format is chosen by file extension.
pub fn list_keys(path: &Path, column: &str, limit: Option<usize>) -> Result<Vec<String>, KeyError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let keys = match extension.as_str() {
        "xlsx" | "xls" | "ods" => read_workbook_keys(path, column, limit),
        "csv" => read_csv_keys(path, column, limit),
        other => Err(KeyError::UnsupportedFormat(format!(
            "{} (expected .xlsx, .xls, .ods or .csv)",
            if other.is_empty() { "<none>" } else { other }
        ))),
    }?;

    info!(
        path = %path.display(),
        column,
        keys = keys.len(),
        "Listed eligible object keys"
    );

    Ok(keys)
}

/// Whether a cell value names a fetchable object
fn is_eligible(value: &str) -> bool {
    !value.is_empty() && value.ends_with(KEY_SUFFIX)
}

fn read_workbook_keys(
    path: &Path,
    column: &str,
    limit: Option<usize>,
) -> Result<Vec<String>, KeyError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| KeyError::SpreadsheetError(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| KeyError::SpreadsheetError("workbook has no sheets".to_string()))?
        .map_err(|e| KeyError::SpreadsheetError(e.to_string()))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| KeyError::ColumnNotFound(column.to_string()))?;

    let index = header
        .iter()
        .position(|cell| matches!(cell, Data::String(s) if s == column))
        .ok_or_else(|| KeyError::ColumnNotFound(column.to_string()))?;

    let keys = rows
        .take(limit.unwrap_or(usize::MAX))
        .filter_map(|row| match row.get(index) {
            Some(Data::String(s)) if is_eligible(s) => Some(s.clone()),
            _ => None,
        })
        .collect();

    Ok(keys)
}

fn read_csv_keys(path: &Path, column: &str, limit: Option<usize>) -> Result<Vec<String>, KeyError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| KeyError::IoError(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| KeyError::CsvError(e.to_string()))?;
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| KeyError::ColumnNotFound(column.to_string()))?;

    let mut keys = Vec::new();
    for (row, record) in reader.records().enumerate() {
        if let Some(n) = limit {
            if row >= n {
                break;
            }
        }
        let record = record.map_err(|e| KeyError::CsvError(e.to_string()))?;
        if let Some(value) = record.get(index) {
            if is_eligible(value) {
                keys.push(value.to_string());
            }
        }
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("keys.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_csv_keys_filtered_by_suffix() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "object_key,size\n\
             exports/a.bson,10\n\
             exports/readme.txt,5\n\
             exports/b.bson,20\n\
             ,0\n",
        );

        let keys = list_keys(&path, "object_key", None).unwrap();
        assert_eq!(keys, vec!["exports/a.bson", "exports/b.bson"]);
    }

    #[test]
    fn test_csv_row_limit_applies_before_filtering() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "object_key\n\
             skip.txt\n\
             exports/a.bson\n\
             exports/b.bson\n",
        );

        // Two rows scanned: the ineligible one plus one key.
        let keys = list_keys(&path, "object_key", Some(2)).unwrap();
        assert_eq!(keys, vec!["exports/a.bson"]);
    }

    #[test]
    fn test_csv_missing_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_csv(&dir, "other\nvalue\n");

        let result = list_keys(&path, "object_key", None);
        assert!(matches!(result, Err(KeyError::ColumnNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = list_keys(Path::new("keys.parquet"), "object_key", None);
        assert!(matches!(result, Err(KeyError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = list_keys(Path::new("/nonexistent/keys.csv"), "object_key", None);
        assert!(matches!(result, Err(KeyError::IoError(_))));
    }
}
