//! Run-to-run resumability primitives shared by both stages.
//!
//! Neither stage keeps in-memory state across runs; completion is always
//! re-derived from the filesystem. Stage 1 treats the existence of an
//! artifact at its deterministic path as the completion marker (safe because
//! artifacts only ever appear there via atomic rename). Stage 2 consults the
//! processed log that is appended alongside the corpus.
//!
//! The pending computation is read-only and happens once before any
//! concurrent work is dispatched; completions that land mid-run do not
//! retroactively exclude items already dispatched.

use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of converted artifacts
pub const ARTIFACT_EXTENSION: &str = "jsonl";

/// Deterministic artifact path for an object key.
///
/// The key's basename with its binary suffix stripped, joined to
/// `download_dir` with the [`ARTIFACT_EXTENSION`]: `exports/ab/c.bson`
/// maps to `<download_dir>/c.jsonl`.
pub fn artifact_path(download_dir: &Path, key: &str) -> PathBuf {
    let stem = Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(key);
    download_dir.join(format!("{stem}.{ARTIFACT_EXTENSION}"))
}

/// Filter `candidates` down to those not yet durably completed.
///
/// `is_complete` is evaluated once per candidate; order is preserved.
pub fn pending<F>(candidates: &[String], is_complete: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    candidates
        .iter()
        .filter(|candidate| !is_complete(candidate))
        .cloned()
        .collect()
}

/// Path of the processed log kept alongside the aggregate corpus
pub fn processed_log_path(output_file: &Path) -> PathBuf {
    let mut name = output_file.as_os_str().to_os_string();
    name.push(".log");
    PathBuf::from(name)
}

/// Load the set of artifact names already folded into the corpus.
///
/// A missing log means nothing has been processed yet. The log is read
/// once at stage start; it is the authoritative resumability signal for
/// the combine stage, not the corpus content itself.
pub fn load_processed(path: &Path) -> std::io::Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let file = std::fs::File::open(path)?;
    let mut processed = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() {
            processed.insert(name.to_string());
        }
    }

    debug!(
        path = %path.display(),
        entries = processed.len(),
        "Loaded processed log"
    );

    Ok(processed)
}
