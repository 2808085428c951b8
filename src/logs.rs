//! Append-only failure logs and corpus/processed-log writers.
//!
//! Every file here is an append target with exactly one writer: the stage
//! orchestrator. Workers hand results back to it instead of touching these
//! files themselves, so lines are never interleaved. Each append is flushed
//! immediately; a crash loses at most the in-flight entry.

use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Log writer errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Underlying file could not be opened or written
    #[error("IO error: {0}")]
    IoError(String),

    /// Record could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for log operations
pub type LogResult<T> = Result<T, LogError>;

fn open_append(path: &Path) -> LogResult<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LogError::IoError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LogError::IoError(format!("Failed to open {}: {e}", path.display())))?;

    Ok(BufWriter::new(file))
}

/// Append-only diagnostic log of per-key failures.
///
/// Entries are purely diagnostic: they are never read back for control
/// flow, and a key that fails repeatedly across runs is retried every run
/// until it succeeds.
pub struct FailureLog {
    out: BufWriter<File>,
    entries: u64,
}

impl FailureLog {
    /// Open the failure log at `path` for appending
    pub fn open(path: &Path) -> LogResult<Self> {
        let out = open_append(path)?;
        debug!(path = %path.display(), "Opened failure log");
        Ok(Self { out, entries: 0 })
    }

    /// Append one timestamped failure entry
    pub fn record(&mut self, key: &str, error: &str) -> LogResult<()> {
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.out, "[{stamp}] Key: {key}")
            .and_then(|_| writeln!(self.out, "Error: {error}"))
            .and_then(|_| writeln!(self.out, "---"))
            .map_err(|e| LogError::IoError(e.to_string()))?;
        self.out
            .flush()
            .map_err(|e| LogError::IoError(e.to_string()))?;

        self.entries += 1;
        Ok(())
    }

    /// Number of entries recorded by this handle
    pub fn entries(&self) -> u64 {
        self.entries
    }
}

/// One aggregate-corpus record
#[derive(Debug, Serialize)]
pub struct CorpusRecord<'a> {
    /// Artifact filename the text was extracted from
    pub source_file: &'a str,
    /// Space-joined extracted text
    pub text: &'a str,
}

/// Single writer for the aggregate corpus and its processed log.
///
/// The two files are written as one logical commit: the corpus line is
/// flushed before the processed-log line, so a crash between the two can
/// only leave a corpus line whose artifact is re-extracted (and re-appended)
/// on the next run. That bounded duplication is the accepted at-least-once
/// cost; the reverse order would silently lose data.
pub struct CorpusAppender {
    corpus: BufWriter<File>,
    processed: BufWriter<File>,
    appended: u64,
}

impl CorpusAppender {
    /// Open the corpus and processed log for appending
    pub fn open(output_file: &Path, processed_log: &Path) -> LogResult<Self> {
        let corpus = open_append(output_file)?;
        let processed = open_append(processed_log)?;
        debug!(
            corpus = %output_file.display(),
            processed_log = %processed_log.display(),
            "Opened corpus appender"
        );
        Ok(Self {
            corpus,
            processed,
            appended: 0,
        })
    }

    /// Append one extracted record and mark its artifact processed
    pub fn append(&mut self, source_file: &str, text: &str) -> LogResult<()> {
        let record = CorpusRecord { source_file, text };
        serde_json::to_writer(&mut self.corpus, &record)
            .map_err(|e| LogError::SerializationError(e.to_string()))?;
        self.corpus
            .write_all(b"\n")
            .map_err(|e| LogError::IoError(e.to_string()))?;
        self.corpus
            .flush()
            .map_err(|e| LogError::IoError(e.to_string()))?;

        self.appended += 1;
        self.mark_processed(source_file)
    }

    /// Mark an artifact processed without a corpus record.
    ///
    /// Used for artifacts that read cleanly but yield no text, so they are
    /// not re-scanned on every future run.
    pub fn mark_processed(&mut self, source_file: &str) -> LogResult<()> {
        writeln!(self.processed, "{source_file}")
            .map_err(|e| LogError::IoError(e.to_string()))?;
        self.processed
            .flush()
            .map_err(|e| LogError::IoError(e.to_string()))
    }

    /// Number of corpus records appended by this handle
    pub fn appended(&self) -> u64 {
        self.appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_failure_log_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("failures.log");

        let mut log = FailureLog::open(&path).unwrap();
        log.record("exports/a.bson", "connection refused").unwrap();
        log.record("exports/b.bson", "decode error").unwrap();
        assert_eq!(log.entries(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Key: exports/a.bson"));
        assert!(contents.contains("Error: connection refused"));
        assert!(contents.contains("Key: exports/b.bson"));
        assert_eq!(contents.matches("---").count(), 2);
    }

    #[test]
    fn test_failure_log_appends_across_handles() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("failures.log");

        {
            let mut log = FailureLog::open(&path).unwrap();
            log.record("a.bson", "first run").unwrap();
        }
        {
            let mut log = FailureLog::open(&path).unwrap();
            log.record("b.bson", "second run").unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("first run"));
        assert!(contents.contains("second run"));
    }

    #[test]
    fn test_corpus_appender_commit_pair() {
        let dir = tempfile::TempDir::new().unwrap();
        let corpus_path = dir.path().join("corpus.jsonl");
        let log_path = dir.path().join("corpus.jsonl.log");

        let mut appender = CorpusAppender::open(&corpus_path, &log_path).unwrap();
        appender.append("a.jsonl", "hello world").unwrap();
        appender.mark_processed("empty.jsonl").unwrap();
        assert_eq!(appender.appended(), 1);
        drop(appender);

        let corpus = std::fs::read_to_string(&corpus_path).unwrap();
        let lines: Vec<&str> = corpus.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["source_file"], "a.jsonl");
        assert_eq!(record["text"], "hello world");

        let processed = std::fs::read_to_string(&log_path).unwrap();
        let names: HashSet<&str> = processed.lines().collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains("a.jsonl"));
        assert!(names.contains("empty.jsonl"));
    }
}
