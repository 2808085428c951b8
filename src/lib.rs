//! # Corpus Collector Library
//!
//! A pipeline for bulk-collecting text corpora from BSON exports hosted in an
//! S3-compatible object store. Object keys are read from a spreadsheet, each
//! object is downloaded through a presigned URL and converted into a
//! line-delimited JSON artifact, and the artifacts are then folded into one
//! aggregate corpus of extracted transcript text.
//!
//! ## Features
//!
//! - **Two independent stages**: download/convert and extract/combine, each
//!   restartable on its own
//! - **Filesystem resumability**: completed work is detected from artifact
//!   files and an append-only processed log; interrupted runs pick up where
//!   they left off with no duplicate downloads
//! - **Crash safety**: artifacts are written to a temporary path and
//!   atomically renamed, so a final path never holds partial content
//! - **Bounded concurrency**: separate worker pools for URL provisioning,
//!   payload download, and text extraction
//! - **Failure accounting**: per-key errors go to append-only failure logs
//!   and never abort a batch
//!
//! ## Quick Start
//!
//! ```no_run
//! use corpus_collector::config::PipelineConfig;
//! use corpus_collector::download::DownloadStage;
//! use corpus_collector::store::S3UrlProvisioner;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load(Path::new("config.yaml"))?;
//! let provisioner = Arc::new(S3UrlProvisioner::new(&config.store));
//! let outcome = DownloadStage::new(&config, provisioner).run().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`keys`] - Object key listing from the input spreadsheet
//! - [`store`] - Presigned-URL provisioning against the object store
//! - [`download`] - Stage 1: fetch payloads and convert them to JSONL
//! - [`combine`] - Stage 2: extract text and fold it into the corpus
//! - [`resume`] - Run-to-run resumability shared by both stages
//! - [`logs`] - Append-only failure logs and corpus/processed-log writers
//! - [`config`] - YAML pipeline configuration
//! - [`cli`] - CLI command implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Stage 2: text extraction and corpus aggregation
pub mod combine;

/// Pipeline configuration
pub mod config;

/// Stage 1: payload download and conversion
pub mod download;

/// Object key listing
pub mod keys;

/// Append-only log and corpus writers
pub mod logs;

/// Run-to-run resumability primitives
pub mod resume;

/// Presigned-URL provisioning
pub mod store;

// Re-export commonly used types
pub use config::PipelineConfig;
