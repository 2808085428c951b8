//! Combine stage orchestration.

use crate::combine::{extract_text, CombineError, ExtractError};
use crate::config::PipelineConfig;
use crate::logs::{CorpusAppender, FailureLog};
use crate::resume;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Aggregate counts reported by a completed combine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineSummary {
    /// Artifacts whose text was appended to the corpus
    pub appended: usize,
    /// Artifacts that read cleanly but held no text (marked processed)
    pub empty: usize,
    /// Artifacts that failed extraction (left pending for the next run)
    pub failed: usize,
    /// Corpus file the records were appended to
    pub output_file: PathBuf,
    /// Processed log recording completion
    pub processed_log: PathBuf,
}

/// Terminal states of a combine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineOutcome {
    /// The extraction pool ran; counts attached
    Completed(CombineSummary),
    /// The download directory does not exist
    NoSourceDir,
    /// Every artifact is already in the processed log
    NoPendingWork,
}

/// Orchestrates artifact enumeration, text extraction and the
/// single-writer corpus commit.
pub struct CombineStage {
    download_dir: PathBuf,
    output_file: PathBuf,
    failure_log: PathBuf,
    workers: usize,
    show_progress: bool,
}

impl CombineStage {
    /// Build a stage from pipeline configuration
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            download_dir: config.paths.download_dir.clone(),
            output_file: config.paths.output_file.clone(),
            failure_log: config.paths.combine_failure_log.clone(),
            workers: config.performance.combine_workers,
            show_progress: false,
        }
    }

    /// Enable or disable terminal progress bars
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run the stage to completion.
    ///
    /// Workers only extract; every append goes through this method's
    /// single [`CorpusAppender`], so corpus and log lines are never
    /// interleaved.
    pub async fn run(&self) -> Result<CombineOutcome, CombineError> {
        if !self.download_dir.exists() {
            warn!(
                dir = %self.download_dir.display(),
                "Download directory does not exist, skipping combine stage"
            );
            return Ok(CombineOutcome::NoSourceDir);
        }

        let processed_log = resume::processed_log_path(&self.output_file);
        let processed = resume::load_processed(&processed_log)
            .map_err(|e| CombineError::IoError(e.to_string()))?;

        let candidates = self.list_artifacts()?;
        let pending = resume::pending(&candidates, |name| processed.contains(name));

        info!(
            processed = processed.len(),
            pending = pending.len(),
            "Computed pending artifact set"
        );

        if pending.is_empty() {
            info!("All artifacts already processed, nothing to combine");
            return Ok(CombineOutcome::NoPendingWork);
        }

        let mut appender = CorpusAppender::open(&self.output_file, &processed_log)
            .map_err(|e| CombineError::CommitError(e.to_string()))?;
        let mut failures = FailureLog::open(&self.failure_log)
            .map_err(|e| CombineError::FailureLogError(e.to_string()))?;

        let bar = self.progress_bar(pending.len() as u64, "Extracting and combining");
        let mut appended = 0usize;
        let mut empty = 0usize;
        let mut failed = 0usize;
        {
            let mut results = stream::iter(pending.iter().cloned())
                .map(|name| {
                    let path = self.download_dir.join(&name);
                    async move {
                        let result = tokio::task::spawn_blocking(move || extract_text(&path))
                            .await
                            .unwrap_or_else(|e| {
                                Err(ExtractError::IoError(format!(
                                    "extraction task failed: {e}"
                                )))
                            });
                        (name, result)
                    }
                })
                .buffer_unordered(self.workers);

            while let Some((name, result)) = results.next().await {
                match result {
                    Ok(Some(text)) => {
                        appender
                            .append(&name, &text)
                            .map_err(|e| CombineError::CommitError(e.to_string()))?;
                        appended += 1;
                    }
                    Ok(None) => {
                        debug!(name = %name, "Artifact holds no extractable text");
                        appender
                            .mark_processed(&name)
                            .map_err(|e| CombineError::CommitError(e.to_string()))?;
                        empty += 1;
                    }
                    Err(e) => {
                        warn!(name = %name, error = %e, "Extraction failed");
                        failures
                            .record(&name, &e.to_string())
                            .map_err(|e| CombineError::FailureLogError(e.to_string()))?;
                        failed += 1;
                    }
                }
                bar.inc(1);
            }
        }
        bar.finish_and_clear();

        let summary = CombineSummary {
            appended,
            empty,
            failed,
            output_file: self.output_file.clone(),
            processed_log,
        };

        info!(
            appended = summary.appended,
            empty = summary.empty,
            failed = summary.failed,
            "Combine stage completed"
        );

        Ok(CombineOutcome::Completed(summary))
    }

    /// Sorted artifact filenames in the download directory
    fn list_artifacts(&self) -> Result<Vec<String>, CombineError> {
        let entries = std::fs::read_dir(&self.download_dir)
            .map_err(|e| CombineError::IoError(e.to_string()))?;

        let suffix = format!(".{}", resume::ARTIFACT_EXTENSION);
        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CombineError::IoError(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(&suffix) {
                names.push(name.to_string());
            }
        }

        // Deterministic dispatch order across runs and platforms.
        names.sort();
        Ok(names)
    }

    fn progress_bar(&self, len: u64, message: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .expect("hardcoded template is valid")
                .progress_chars("#>-"),
        );
        bar.set_message(message.to_string());
        bar
    }
}
