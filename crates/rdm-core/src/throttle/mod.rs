//! Bandwidth limiting.
//!
//! `ThrottledStream` delays reads/writes so a single stream stays under a
//! bytes-per-second ceiling; `BandwidthBudget` splits the session ceiling
//! across the chunk workers that are currently running.

mod budget;
mod stream;

pub use budget::{BandwidthBudget, BudgetShare};
pub use stream::ThrottledStream;

use crate::error::DownloadError;

/// Internal representation of "no limit".
pub const UNLIMITED: u64 = u64::MAX;

/// Converts a configured ceiling into an internal limit.
///
/// Negative values are rejected; zero means unlimited and maps to
/// [`UNLIMITED`] so rate math never divides by zero.
pub fn bandwidth_limit(max_bytes_per_second: i64) -> Result<u64, DownloadError> {
    match max_bytes_per_second {
        n if n < 0 => Err(DownloadError::InvalidConfiguration(format!(
            "max_bytes_per_second must not be negative (got {})",
            n
        ))),
        0 => Ok(UNLIMITED),
        n => Ok(n as u64),
    }
}
