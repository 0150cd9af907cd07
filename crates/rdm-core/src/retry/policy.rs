use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect or idle read).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, short body, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// Any other error (not retried).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Retry budget per chunk.
///
/// In TOML this is either a number (`max_retries_per_chunk = 3`) or the
/// string `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RetryLimitRepr", into = "RetryLimitRepr")]
pub enum RetryLimit {
    Finite(u32),
    Unlimited,
}

impl RetryLimit {
    /// True if a chunk that has already retried `retries_used` times may retry again.
    pub fn allows(&self, retries_used: u32) -> bool {
        match self {
            RetryLimit::Finite(max) => retries_used < *max,
            RetryLimit::Unlimited => true,
        }
    }
}

impl Default for RetryLimit {
    fn default() -> Self {
        RetryLimit::Finite(5)
    }
}

impl fmt::Display for RetryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryLimit::Finite(n) => write!(f, "{}", n),
            RetryLimit::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl std::str::FromStr for RetryLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(RetryLimit::Unlimited);
        }
        s.parse::<u32>()
            .map(RetryLimit::Finite)
            .map_err(|_| format!("expected a retry count or \"unlimited\", got {:?}", s))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RetryLimitRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<RetryLimitRepr> for RetryLimit {
    type Error = String;

    fn try_from(repr: RetryLimitRepr) -> Result<Self, Self::Error> {
        match repr {
            RetryLimitRepr::Count(n) => Ok(RetryLimit::Finite(n)),
            RetryLimitRepr::Word(w) => w.parse(),
        }
    }
}

impl From<RetryLimit> for RetryLimitRepr {
    fn from(limit: RetryLimit) -> Self {
        match limit {
            RetryLimit::Finite(n) => RetryLimitRepr::Count(n),
            RetryLimit::Unlimited => RetryLimitRepr::Word("unlimited".to_string()),
        }
    }
}

/// Exponential backoff policy bounded by a per-chunk retry budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// How many times one chunk may be reopened after a transient failure.
    pub limit: RetryLimit,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: RetryLimit::default(),
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after a failure, given how many retries the chunk
    /// has already used. Returns `RetryDecision::NoRetry` when the error is
    /// not transient or the budget is spent.
    pub fn decide(&self, retries_used: u32, kind: ErrorKind) -> RetryDecision {
        if kind == ErrorKind::Other || !self.limit.allows(retries_used) {
            return RetryDecision::NoRetry;
        }
        // base * 2^retries_used, capped.
        let exp = 1u32 << retries_used.min(8);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}
