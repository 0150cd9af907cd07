//! Transfer error type for retry classification.

use std::time::Duration;
use thiserror::Error;

/// Error returned by a single network attempt (probe or ranged GET).
/// Kept separate from `DownloadError` so the scheduler can classify it and
/// decide on a retry before anything reaches the caller.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Curl reported an error (connect, reset, DNS, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a status we cannot use.
    #[error("HTTP {0}")]
    Http(u32),
    /// The body ended before the requested range was delivered.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// No data arrived within the configured read timeout.
    #[error("no data received for {0:?}")]
    ReadTimeout(Duration),
    /// Server answered a ranged GET with 200 and the full body.
    #[error("server ignored the Range header")]
    RangeIgnored,
    /// Disk or buffer write failed. Never retried.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
}
