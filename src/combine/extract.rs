//! Transcript text extraction from one converted artifact.

use crate::combine::ExtractError;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Document field holding the per-document item list
const ITEMS_FIELD: &str = "items";

/// Item field holding the rendered transcript text
const TEXT_FIELD: &str = "formattedString";

/// Extract the transcript text of one artifact.
///
/// The artifact is read line by line; each non-blank line is one JSON
/// document. Lines that fail to parse are skipped silently rather than
/// failing the artifact, so one bad document never costs the rest of the
/// file. Every non-empty [`TEXT_FIELD`] value found across the documents'
/// [`ITEMS_FIELD`] lists is collected in file order and space-joined.
///
/// Returns `Ok(None)` when the artifact holds no extractable text at all;
/// only file-level I/O trouble is an error.
pub fn extract_text(path: &Path) -> Result<Option<String>, ExtractError> {
    let file = File::open(path).map_err(|e| ExtractError::IoError(e.to_string()))?;
    let reader = BufReader::new(file);

    let mut collected: Vec<String> = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| ExtractError::IoError(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }

        let document: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => continue,
        };

        let Some(items) = document.get(ITEMS_FIELD).and_then(Value::as_array) else {
            continue;
        };

        for item in items {
            if let Some(text) = item.get(TEXT_FIELD).and_then(Value::as_str) {
                if !text.is_empty() {
                    collected.push(text.to_string());
                }
            }
        }
    }

    if collected.is_empty() {
        Ok(None)
    } else {
        Ok(Some(collected.join(" ")))
    }
}
