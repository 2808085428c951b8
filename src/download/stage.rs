//! Download stage orchestration.

use crate::config::PipelineConfig;
use crate::download::{fetch_and_convert, DownloadError};
use crate::keys;
use crate::logs::FailureLog;
use crate::resume;
use crate::store::UrlProvisioner;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Aggregate counts reported by a completed download run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Eligible keys listed from the key file
    pub total: usize,
    /// Keys skipped because their artifact already existed
    pub already_present: usize,
    /// Keys for which a presigned URL was obtained
    pub provisioned: usize,
    /// Artifacts successfully fetched and converted
    pub fetched: usize,
    /// Keys that failed provisioning or fetch/convert
    pub failed: usize,
}

/// Terminal states of a download run.
///
/// The early exits are valid completions, not errors: they mean the run
/// found nothing left to do at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Both pools ran; counts attached
    Completed(DownloadSummary),
    /// The key file held no eligible keys
    NoKeys,
    /// Every key already has its artifact
    NoPendingWork,
    /// No presigned URL could be obtained for any pending key
    NoUrls,
}

/// Orchestrates listing, pending computation, URL provisioning and
/// fetch/conversion under bounded concurrency.
pub struct DownloadStage {
    provisioner: Arc<dyn UrlProvisioner>,
    http: reqwest::Client,
    key_file: PathBuf,
    column: String,
    limit: Option<usize>,
    download_dir: PathBuf,
    failure_log: PathBuf,
    url_workers: usize,
    download_workers: usize,
    show_progress: bool,
}

impl DownloadStage {
    /// Build a stage from pipeline configuration and a URL provisioner
    pub fn new(config: &PipelineConfig, provisioner: Arc<dyn UrlProvisioner>) -> Self {
        Self {
            provisioner,
            http: reqwest::Client::new(),
            key_file: config.paths.key_file.clone(),
            column: config.source.column.clone(),
            limit: config.source.row_limit(),
            download_dir: config.paths.download_dir.clone(),
            failure_log: config.paths.download_failure_log.clone(),
            url_workers: config.performance.url_workers,
            download_workers: config.performance.download_workers,
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
    /// Per-key failures are logged and counted, never fatal; the returned
    /// error covers only conditions that make the run's bookkeeping
    /// impossible.
    pub async fn run(&self) -> Result<DownloadOutcome, DownloadError> {
        let keys = keys::list_keys(&self.key_file, &self.column, self.limit)?;
        if keys.is_empty() {
            info!("No eligible keys listed, nothing to download");
            return Ok(DownloadOutcome::NoKeys);
        }

        std::fs::create_dir_all(&self.download_dir)
            .map_err(|e| DownloadError::IoError(e.to_string()))?;

        let pending = resume::pending(&keys, |key| {
            resume::artifact_path(&self.download_dir, key).exists()
        });
        let already_present = keys.len() - pending.len();

        info!(
            total = keys.len(),
            already_present,
            pending = pending.len(),
            "Computed pending set"
        );

        if pending.is_empty() {
            info!("All artifacts already present, nothing to download");
            return Ok(DownloadOutcome::NoPendingWork);
        }

        let mut failures = FailureLog::open(&self.failure_log)
            .map_err(|e| DownloadError::FailureLogError(e.to_string()))?;

        // URL provisioning pool. Failures are logged per key and the key
        // drops out of the fetch phase; it stays pending for the next run.
        let bar = self.progress_bar(pending.len() as u64, "Provisioning URLs");
        let mut urls: Vec<(String, String)> = Vec::with_capacity(pending.len());
        {
            let mut results = stream::iter(pending.iter().cloned())
                .map(|key| {
                    let provisioner = self.provisioner.clone();
                    async move {
                        let result = provisioner.provision(&key).await;
                        (key, result)
                    }
                })
                .buffer_unordered(self.url_workers);

            while let Some((key, result)) = results.next().await {
                match result {
                    Ok(url) => urls.push((key, url)),
                    Err(e) => {
                        warn!(key = %key, error = %e, "URL provisioning failed");
                        failures
                            .record(&key, &format!("URL provisioning failed: {e}"))
                            .map_err(|e| DownloadError::FailureLogError(e.to_string()))?;
                    }
                }
                bar.inc(1);
            }
        }
        bar.finish_and_clear();

        let provision_failed = pending.len() - urls.len();
        if urls.is_empty() {
            warn!("No presigned URL could be obtained for any pending key");
            return Ok(DownloadOutcome::NoUrls);
        }

        // Fetch/convert pool, typically wider since it is I/O bound.
        let bar = self.progress_bar(urls.len() as u64, "Downloading and converting");
        let mut fetched = 0usize;
        let mut fetch_failed = 0usize;
        {
            let mut results = stream::iter(urls.iter().cloned())
                .map(|(key, url)| {
                    let client = self.http.clone();
                    let download_dir = self.download_dir.clone();
                    async move {
                        let result = fetch_and_convert(&client, &key, &url, &download_dir).await;
                        (key, result)
                    }
                })
                .buffer_unordered(self.download_workers);

            while let Some((key, result)) = results.next().await {
                match result {
                    Ok(_) => fetched += 1,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Fetch/convert failed");
                        failures
                            .record(&key, &format!("Fetch/convert failed: {e}"))
                            .map_err(|e| DownloadError::FailureLogError(e.to_string()))?;
                        fetch_failed += 1;
                    }
                }
                bar.inc(1);
            }
        }
        bar.finish_and_clear();

        let summary = DownloadSummary {
            total: keys.len(),
            already_present,
            provisioned: urls.len(),
            fetched,
            failed: provision_failed + fetch_failed,
        };

        info!(
            total = summary.total,
            already_present = summary.already_present,
            provisioned = summary.provisioned,
            fetched = summary.fetched,
            failed = summary.failed,
            "Download stage completed"
        );

        Ok(DownloadOutcome::Completed(summary))
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
