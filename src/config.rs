//! Pipeline configuration loaded from a YAML document.
//!
//! One document drives the whole pipeline: which stages run, how the object
//! store is reached, how wide each worker pool is, and where every input and
//! output file lives. All knobs except the store credentials and the paths
//! carry defaults so a minimal document stays small.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Maximum allowed worker-pool size to prevent self-inflicted throttling
/// by the object store or the local disk.
pub const MAX_WORKERS: usize = 64;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("IO error: {0}")]
    IoError(String),

    /// Configuration document could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Configuration document is structurally valid but unusable
    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Stage enable flags for the `run` command
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StageToggles {
    /// Run the download stage
    #[serde(default)]
    pub run_download: bool,

    /// Run the combine stage
    #[serde(default)]
    pub run_combine: bool,
}

/// Object store access settings
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store region (e.g. "us-east-1")
    pub region: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Bucket holding the BSON exports
    pub bucket: String,

    /// Lifetime of generated presigned URLs, in minutes
    #[serde(default = "default_url_expiry_minutes")]
    pub url_expiry_minutes: u64,
}

impl StoreConfig {
    /// Presigned-URL lifetime as a [`Duration`]
    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.url_expiry_minutes * 60)
    }
}

/// Key list input settings
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Name of the spreadsheet column holding the object keys
    pub column: String,

    /// Number of rows to scan from the key file; 0 means all rows
    #[serde(default)]
    pub limit: usize,
}

impl SourceConfig {
    /// Row limit as an `Option`, `None` meaning unlimited
    pub fn row_limit(&self) -> Option<usize> {
        if self.limit == 0 {
            None
        } else {
            Some(self.limit)
        }
    }
}

/// Worker-pool sizes
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    /// Concurrent presigned-URL generations
    #[serde(default = "default_url_workers")]
    pub url_workers: usize,

    /// Concurrent payload downloads/conversions
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// Concurrent artifact extractions
    #[serde(default = "default_combine_workers")]
    pub combine_workers: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            url_workers: default_url_workers(),
            download_workers: default_download_workers(),
            combine_workers: default_combine_workers(),
        }
    }
}

/// Filesystem locations used by the pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Spreadsheet (or CSV) listing the object keys to fetch
    pub key_file: PathBuf,

    /// Directory receiving one JSONL artifact per object
    pub download_dir: PathBuf,

    /// Append-only failure log for the download stage
    pub download_failure_log: PathBuf,

    /// Append-only failure log for the combine stage
    pub combine_failure_log: PathBuf,

    /// Aggregate corpus output file; its processed log lives alongside it
    /// with a `.log` suffix
    pub output_file: PathBuf,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Stage enable flags
    #[serde(default)]
    pub stages: StageToggles,

    /// Object store access
    pub store: StoreConfig,

    /// Key list input
    pub source: SourceConfig,

    /// Worker-pool sizes
    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Filesystem locations
    pub paths: PathsConfig,
}

impl PipelineConfig {
    /// Load and validate a configuration document from `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading pipeline configuration");

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::IoError(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::parse(&contents)
    }

    /// Parse and validate a configuration document from a YAML string
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values beyond what deserialization enforces
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.column.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "source.column must not be empty".to_string(),
            ));
        }

        if self.store.url_expiry_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "store.url_expiry_minutes must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("performance.url_workers", self.performance.url_workers),
            (
                "performance.download_workers",
                self.performance.download_workers,
            ),
            (
                "performance.combine_workers",
                self.performance.combine_workers,
            ),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be at least 1"
                )));
            }
            if value > MAX_WORKERS {
                return Err(ConfigError::ValidationError(format!(
                    "{name} ({value}) exceeds maximum of {MAX_WORKERS}"
                )));
            }
        }

        Ok(())
    }
}

fn default_url_expiry_minutes() -> u64 {
    60
}

fn default_url_workers() -> usize {
    8
}

fn default_download_workers() -> usize {
    16
}

fn default_combine_workers() -> usize {
    8
}
