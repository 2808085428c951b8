//! Command definitions and execution.

use crate::combine::{CombineOutcome, CombineStage};
use crate::config::PipelineConfig;
use crate::download::{DownloadOutcome, DownloadStage};
use crate::store::S3UrlProvisioner;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::CliError;

/// Command-line interface for the corpus collection pipeline
#[derive(Debug, Parser)]
#[command(
    name = "corpus-collector",
    version,
    about = "Bulk BSON-to-JSONL download and text corpus aggregation"
)]
pub struct Cli {
    /// Path to the YAML pipeline configuration
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the stages enabled in the configuration, download first
    Run,
    /// Run only the download stage
    Download,
    /// Run only the combine stage
    Combine,
}

/// Execute the parsed command
pub async fn execute(cli: &Cli) -> Result<(), CliError> {
    let config = PipelineConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run => {
            let started = std::time::Instant::now();
            if config.stages.run_download {
                run_download(&config).await?;
            } else {
                info!("Download stage disabled in configuration, skipping");
            }
            if config.stages.run_combine {
                run_combine(&config).await?;
            } else {
                info!("Combine stage disabled in configuration, skipping");
            }
            println!(
                "all enabled stages finished in {:.2}s",
                started.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Commands::Download => run_download(&config).await,
        Commands::Combine => run_combine(&config).await,
    }
}

async fn run_download(config: &PipelineConfig) -> Result<(), CliError> {
    let provisioner = Arc::new(S3UrlProvisioner::new(&config.store));
    let stage = DownloadStage::new(config, provisioner).with_progress(true);

    let outcome = stage.run().await?;
    match outcome {
        DownloadOutcome::Completed(summary) => {
            println!(
                "download stage: {} fetched, {} failed ({} of {} keys already present)",
                summary.fetched, summary.failed, summary.already_present, summary.total
            );
            if summary.failed > 0 {
                println!(
                    "  failure details: {}",
                    config.paths.download_failure_log.display()
                );
            }
        }
        DownloadOutcome::NoKeys => {
            println!(
                "download stage: no eligible keys in {}",
                config.paths.key_file.display()
            );
        }
        DownloadOutcome::NoPendingWork => {
            println!("download stage: all artifacts already present, nothing to do");
        }
        DownloadOutcome::NoUrls => {
            println!(
                "download stage: no presigned URL could be obtained; see {}",
                config.paths.download_failure_log.display()
            );
        }
    }

    Ok(())
}

async fn run_combine(config: &PipelineConfig) -> Result<(), CliError> {
    let stage = CombineStage::new(config).with_progress(true);

    let outcome = stage.run().await?;
    match outcome {
        CombineOutcome::Completed(summary) => {
            println!(
                "combine stage: {} appended, {} empty, {} failed",
                summary.appended, summary.empty, summary.failed
            );
            println!("  corpus: {}", summary.output_file.display());
            println!("  processed log: {}", summary.processed_log.display());
            if summary.failed > 0 {
                println!(
                    "  failure details: {}",
                    config.paths.combine_failure_log.display()
                );
            }
        }
        CombineOutcome::NoSourceDir => {
            println!(
                "combine stage: download directory {} does not exist, skipped",
                config.paths.download_dir.display()
            );
        }
        CombineOutcome::NoPendingWork => {
            println!("combine stage: all artifacts already processed, nothing to do");
        }
    }

    Ok(())
}
