//! Chunk execution: one worker pool, bounded at 1 (sequential) or the number
//! of incomplete chunks (parallel).
//!
//! Each worker owns one chunk at a time. It streams the chunk's remaining
//! range into storage through a throttled writer, retries transient failures
//! from the current cursor, and hands the chunk back with its cursor advanced
//! whatever the outcome.

mod pool;
mod worker;

pub(crate) use pool::{run_chunks, RunOutcome};

use std::thread;
use std::time::{Duration, Instant};

use crate::config::DownloadConfiguration;
use crate::control::CancelHandle;
use crate::events::ProgressTracker;
use crate::retry::RetryPolicy;
use crate::storage::Storage;
use crate::throttle::BandwidthBudget;

/// Granularity of interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Everything a chunk worker reads but does not own.
pub(crate) struct ChunkContext<'a> {
    pub url: &'a str,
    pub total_size: Option<u64>,
    pub supports_range: bool,
    pub config: &'a DownloadConfiguration,
    pub policy: RetryPolicy,
    pub storage: &'a Storage,
    pub budget: &'a BandwidthBudget,
    pub tracker: &'a ProgressTracker<'a>,
    pub cancel: &'a CancelHandle,
    /// Set when one worker aborts so the rest stop at their next block.
    pub stop: &'a CancelHandle,
}

/// Why a worker stopped before finishing its chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interruption {
    Cancelled,
    Stopped,
}

impl ChunkContext<'_> {
    pub(crate) fn interruption(&self) -> Option<Interruption> {
        if self.cancel.is_cancelled() {
            Some(Interruption::Cancelled)
        } else if self.stop.is_cancelled() {
            Some(Interruption::Stopped)
        } else {
            None
        }
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interruption().is_some()
    }

    pub(crate) fn stop_others(&self) {
        self.stop.cancel();
    }

    /// Sleep for `delay`, waking early on cancel or stop.
    pub(crate) fn sleep(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        loop {
            if self.is_interrupted() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
