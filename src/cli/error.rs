//! CLI error types and conversions

use crate::combine::CombineError;
use crate::config::ConfigError;
use crate::download::DownloadError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Download stage error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Combine stage error
    #[error("combine error: {0}")]
    CombineError(#[from] CombineError),
}
