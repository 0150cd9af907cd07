//! Retry and backoff policy.
//!
//! Classifies per-chunk transfer failures (timeouts, throttling, dropped
//! connections) and decides whether a chunk may be reopened from its current
//! position, and after how long.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::TransferError;
pub use policy::{ErrorKind, RetryDecision, RetryLimit, RetryPolicy};
