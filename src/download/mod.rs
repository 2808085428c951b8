//! Stage 1: presigned-URL provisioning, payload download, BSON-to-JSONL
//! conversion.
//!
//! # Overview
//!
//! The download stage walks a fixed sequence:
//!
//! 1. **Listing**: read all object keys from the key file
//! 2. **Pending set**: drop keys whose artifact already exists
//! 3. **URL provisioning**: presign the remainder under one bounded pool
//! 4. **Fetch/convert**: download and convert under a second, wider pool
//!
//! Per-key failures at provisioning or fetch time are appended to the
//! stage's failure log and excluded from the success count; they never
//! abort the batch. Only errors that make the stage's bookkeeping
//! impossible (unreadable key file, unwritable failure log) are fatal.
//!
//! Re-running the stage is safe and cheap: completed artifacts are skipped
//! before any network traffic, and interrupted conversions leave nothing at
//! the final path thanks to the write-to-temporary-then-rename discipline
//! in [`fetch`].

pub mod fetch;
pub mod stage;

pub use fetch::fetch_and_convert;
pub use stage::{DownloadOutcome, DownloadStage, DownloadSummary};

/// Fatal download-stage errors.
///
/// Everything here aborts the stage; per-key trouble is a [`FetchError`]
/// or a provisioning failure and only ever reaches the failure log.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Key listing failed
    #[error("key listing error: {0}")]
    KeyError(#[from] crate::keys::KeyError),

    /// Failure log could not be opened or appended to
    #[error("failure log error: {0}")]
    FailureLogError(String),

    /// Download directory could not be prepared
    #[error("IO error: {0}")]
    IoError(String),
}

/// Per-object fetch/convert failures
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level error (timeout, connection refused, ...)
    #[error("network error: {0}")]
    NetworkError(String),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Payload is not a valid sequence of binary documents
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Local artifact write failed
    #[error("IO error: {0}")]
    IoError(String),
}
