use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DownloadError;
use crate::retry::{RetryLimit, RetryPolicy};
use crate::throttle;

/// Per-session download settings. Cheap to clone; a session never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfiguration {
    /// Run chunk workers concurrently (`true`) or one at a time in chunk order.
    pub parallel: bool,
    /// Number of ranges to split the resource into.
    pub chunk_count: usize,
    /// Maximum bytes handed to storage (and reported) per progress step.
    pub buffer_block_size: usize,
    /// Retry budget per chunk: a number or `"unlimited"`.
    pub max_retries_per_chunk: RetryLimit,
    /// Keep chunk data in memory and merge at the end instead of writing to disk as it arrives.
    pub in_memory_storage: bool,
    /// Abort and retry an attempt that receives no data for this long.
    pub read_timeout_ms: u64,
    /// Aggregate bandwidth ceiling in bytes per second; 0 = unlimited.
    pub max_bytes_per_second: i64,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay_ms: u64,
    /// Upper bound on backoff delay.
    pub retry_max_delay_ms: u64,
}

impl Default for DownloadConfiguration {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            parallel: false,
            chunk_count: 1,
            buffer_block_size: 8000,
            max_retries_per_chunk: policy.limit,
            in_memory_storage: false,
            read_timeout_ms: 1000,
            max_bytes_per_second: 0,
            retry_base_delay_ms: policy.base_delay.as_millis() as u64,
            retry_max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl DownloadConfiguration {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), DownloadError> {
        let invalid = |msg: &str| Err(DownloadError::InvalidConfiguration(msg.to_string()));
        if self.chunk_count < 1 {
            return invalid("chunk_count must be at least 1");
        }
        if self.buffer_block_size == 0 {
            return invalid("buffer_block_size must be greater than 0");
        }
        if self.read_timeout_ms == 0 {
            return invalid("read_timeout_ms must be greater than 0");
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return invalid("retry_base_delay_ms must not exceed retry_max_delay_ms");
        }
        throttle::bandwidth_limit(self.max_bytes_per_second)?;
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Aggregate ceiling in internal form (`u64::MAX` = unlimited).
    pub fn bandwidth_limit(&self) -> Result<u64, DownloadError> {
        throttle::bandwidth_limit(self.max_bytes_per_second)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            limit: self.max_retries_per_chunk,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Contents of `~/.config/rdm/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdmConfig {
    /// Where `rdm download` saves the package of an unfinished download
    /// when no path is given (defaults to next to the destination).
    #[serde(default)]
    pub package_dir: Option<PathBuf>,
    #[serde(default)]
    pub download: DownloadConfiguration,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RdmConfig = toml::from_str(&data)?;
    cfg.download.validate()?;
    Ok(cfg)
}
