//! Session-level error taxonomy.
//!
//! Only conditions that end a session reach the caller. Per-chunk transient
//! failures stay inside the scheduler unless the retry budget runs out.
//! Cancellation is an outcome, not an error.

use crate::retry::TransferError;
use crate::safe_resume::ValidationError;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Rejected before any network activity.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Size/range probe failed; nothing was written.
    #[error("failed to start download of {url}")]
    Probe {
        url: String,
        #[source]
        source: TransferError,
    },

    /// A chunk used up its retry budget.
    #[error("chunk {chunk} aborted after {retries} retries")]
    RetryExhausted {
        chunk: usize,
        retries: u32,
        #[source]
        source: TransferError,
    },

    /// A chunk hit an error that is not worth retrying (e.g. HTTP 404).
    #[error("chunk {chunk} failed")]
    ChunkFailed {
        chunk: usize,
        #[source]
        source: TransferError,
    },

    /// Disk or buffer write failed. Never retried.
    #[error("storage write failed")]
    StorageWrite(#[source] std::io::Error),

    /// The remote resource no longer matches the persisted package.
    #[error(transparent)]
    ResourceChanged(#[from] ValidationError),

    /// Merging or renaming the finished output failed.
    #[error("failed to finalize output")]
    Merge(#[source] std::io::Error),

    /// Reading or writing a persisted package failed.
    #[error("package file: {0}")]
    PackageIo(#[source] std::io::Error),

    /// A package whose chunks do not describe a valid partition.
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    /// A persisted package could not be parsed or encoded.
    #[error("package format")]
    PackageFormat(#[from] serde_json::Error),
}

impl DownloadError {
    /// Full `a: b: c` chain of this error and its sources, for event payloads and logs.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = StdError::source(self);
        while let Some(e) = source {
            out.push_str(": ");
            out.push_str(&e.to_string());
            source = e.source();
        }
        out
    }
}
