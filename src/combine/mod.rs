//! Stage 2: text extraction and corpus aggregation.
//!
//! # Overview
//!
//! The combine stage enumerates every converted artifact in the download
//! directory (its own output from a previous run, or files placed there by
//! anything else), skips the ones already named in the processed log, and
//! extracts the transcript text from the remainder under bounded
//! concurrency. Each successful extraction is committed as one corpus line
//! plus one processed-log line; the corpus line always lands first, so a
//! crash can duplicate at most one in-flight record and never lose one.
//!
//! Artifacts that read cleanly but yield no text are recorded in the
//! processed log without a corpus line, so they are not re-scanned forever.
//! Artifacts that fail with an I/O-level error stay pending and are
//! retried on the next run.

pub mod extract;
pub mod stage;

pub use extract::extract_text;
pub use stage::{CombineOutcome, CombineStage, CombineSummary};

/// Fatal combine-stage errors.
///
/// Appends to the corpus or its logs are the stage's whole contract, so a
/// failed append aborts the run rather than risking silent data loss.
#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    /// Corpus or processed-log append failed
    #[error("commit error: {0}")]
    CommitError(String),

    /// Failure log could not be opened or appended to
    #[error("failure log error: {0}")]
    FailureLogError(String),

    /// Download directory or processed log could not be read
    #[error("IO error: {0}")]
    IoError(String),
}

/// Per-artifact extraction failures
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Artifact could not be opened or read
    #[error("IO error: {0}")]
    IoError(String),
}
