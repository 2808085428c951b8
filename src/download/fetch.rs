//! Payload fetch and BSON-to-JSONL conversion for one object.
//!
//! The payload of each object is a concatenation of length-prefixed BSON
//! documents. Conversion decodes them in order and writes one JSON line per
//! document to a temporary file that is atomically renamed into place only
//! after the whole payload decoded cleanly. A final artifact path therefore
//! either does not exist or is complete, which is what lets the pending
//! computation trust bare file existence.

use crate::download::FetchError;
use crate::resume;
use bson::{Bson, Document};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed per-request timeout for payload downloads
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Download the payload behind `url` and convert it into the JSONL
/// artifact for `key` under `download_dir`.
///
/// If the artifact already exists the path is returned immediately with no
/// network access; this makes overlapping runs and re-runs after a crash
/// idempotent. On any failure the final path is left untouched (a partially
/// written temporary file may remain and is overwritten on retry).
pub async fn fetch_and_convert(
    client: &reqwest::Client,
    key: &str,
    url: &str,
    download_dir: &Path,
) -> Result<PathBuf, FetchError> {
    let final_path = resume::artifact_path(download_dir, key);
    if final_path.exists() {
        debug!(key, "Artifact already present, skipping fetch");
        return Ok(final_path);
    }

    let response = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| FetchError::NetworkError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        warn!(key, status = status.as_u16(), "Fetch returned non-success status");
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::NetworkError(e.to_string()))?;

    let tmp_path = temporary_path(&final_path);
    convert_to_jsonl(&body, &tmp_path)?;

    fs::rename(&tmp_path, &final_path).map_err(|e| FetchError::IoError(e.to_string()))?;

    debug!(key, path = %final_path.display(), bytes = body.len(), "Artifact written");
    Ok(final_path)
}

/// Transient sibling of the final artifact path
fn temporary_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Decode concatenated BSON documents from `body` into one-JSON-line-per-
/// document at `tmp_path`.
///
/// A decode error abandons the temporary file; it is never promoted.
fn convert_to_jsonl(body: &[u8], tmp_path: &Path) -> Result<(), FetchError> {
    let file = File::create(tmp_path).map_err(|e| FetchError::IoError(e.to_string()))?;
    let mut out = BufWriter::new(file);

    let mut reader = Cursor::new(body);
    while (reader.position() as usize) < body.len() {
        let document = Document::from_reader(&mut reader)
            .map_err(|e| FetchError::DecodeError(e.to_string()))?;
        let value = document_to_json(document);
        serde_json::to_writer(&mut out, &value)
            .map_err(|e| FetchError::IoError(e.to_string()))?;
        out.write_all(b"\n")
            .map_err(|e| FetchError::IoError(e.to_string()))?;
    }

    out.flush().map_err(|e| FetchError::IoError(e.to_string()))
}

/// Convert a decoded document into plain JSON.
fn document_to_json(document: Document) -> Value {
    let mut object = Map::with_capacity(document.len());
    for (name, value) in document {
        object.insert(name, bson_to_json(value));
    }
    Value::Object(object)
}

/// Map a BSON value onto JSON, coercing values without a native JSON
/// representation (object IDs, datetimes, binary, ...) to their string form.
fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(document) => document_to_json(document),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null => Value::Null,
        Bson::Int32(i) => Value::Number(i.into()),
        Bson::Int64(i) => Value::Number(i.into()),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => Value::String(dt.to_string()),
        other => Value::String(other.to_string()),
    }
}
