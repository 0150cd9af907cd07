//! CLI for the RDM download engine.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rdm_core::config::{self, RdmConfig};
use rdm_core::{DownloadConfiguration, RetryLimit};
use std::path::PathBuf;

use commands::{run_download, run_resume};

/// Top-level CLI for the RDM download engine.
#[derive(Debug, Parser)]
#[command(name = "rdm")]
#[command(about = "RDM: resumable, multi-range, throttled HTTP downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL. Press Enter to stop; the unfinished download is saved as a package.
    Download {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Output file. Defaults to a name derived from the URL.
        #[arg(short, long, value_name = "PATH", conflicts_with = "dir")]
        output: Option<PathBuf>,

        /// Directory to save into (the file name comes from the server or URL).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Where to save the package if the download is stopped or fails.
        #[arg(long, value_name = "PATH")]
        package: Option<PathBuf>,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Resume a download from a saved package.
    Resume {
        /// Package file written by an earlier `rdm download`.
        package: PathBuf,

        #[command(flatten)]
        tuning: TuningArgs,
    },
}

/// Per-run overrides of the `[download]` section of config.toml.
#[derive(Debug, Default, Args)]
pub struct TuningArgs {
    /// Number of ranges to split the resource into.
    #[arg(long, value_name = "N")]
    pub chunks: Option<usize>,

    /// Fetch chunks concurrently instead of one after another.
    #[arg(long)]
    pub parallel: bool,

    /// Keep chunk data in memory and write the file once at the end.
    #[arg(long)]
    pub in_memory: bool,

    /// Aggregate bandwidth ceiling in bytes per second (0 = unlimited).
    #[arg(long, value_name = "BYTES", allow_negative_numbers = true)]
    pub max_speed: Option<i64>,

    /// Retries per chunk: a number or "unlimited".
    #[arg(long, value_name = "N|unlimited")]
    pub retries: Option<RetryLimit>,

    /// Bytes handed to storage per progress step.
    #[arg(long, value_name = "BYTES")]
    pub block_size: Option<usize>,

    /// Retry an attempt that receives nothing for this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

impl TuningArgs {
    /// Apply the flags that were given on top of the configured defaults.
    pub fn apply(&self, base: &DownloadConfiguration) -> DownloadConfiguration {
        let mut cfg = base.clone();
        if let Some(n) = self.chunks {
            cfg.chunk_count = n;
        }
        if self.parallel {
            cfg.parallel = true;
        }
        if self.in_memory {
            cfg.in_memory_storage = true;
        }
        if let Some(limit) = self.max_speed {
            cfg.max_bytes_per_second = limit;
        }
        if let Some(retries) = self.retries {
            cfg.max_retries_per_chunk = retries;
        }
        if let Some(block) = self.block_size {
            cfg.buffer_block_size = block;
        }
        if let Some(ms) = self.timeout_ms {
            cfg.read_timeout_ms = ms;
        }
        cfg
    }
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg: RdmConfig = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Download {
                url,
                output,
                dir,
                package,
                tuning,
            } => {
                let download = tuning.apply(&cfg.download);
                run_download(
                    &cfg,
                    download,
                    &url,
                    output.as_deref(),
                    dir.as_deref(),
                    package.as_deref(),
                )?;
            }
            CliCommand::Resume { package, tuning } => {
                let download = tuning.apply(&cfg.download);
                run_resume(download, &package)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
