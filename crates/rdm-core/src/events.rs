//! Download events and the listener seam.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::service::DownloadOutput;

/// Emitted once per run, before the first byte is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedEvent {
    pub url: String,
    /// Size reported by the server, if any.
    pub total_bytes: Option<u64>,
    pub supports_range: bool,
    pub chunk_count: usize,
    /// Bytes already present from an earlier run (non-zero on resume).
    pub resumed_bytes: u64,
}

/// Emitted after every block a chunk writes to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub chunk_id: usize,
    /// The chunk's cursor after this block.
    pub chunk_position: u64,
    /// Bytes received across all chunks so far, including earlier runs.
    pub bytes_received: u64,
    pub total_bytes: Option<u64>,
    /// The block itself.
    pub received: Vec<u8>,
    /// Bytes received in this run divided by this run's elapsed time.
    pub bytes_per_second: f64,
}

impl ProgressEvent {
    /// Fraction complete in [0.0, 1.0]; `None` when the size is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.bytes_received as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    /// Estimated seconds remaining (None if the rate or size is unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_bytes?.saturating_sub(self.bytes_received);
        if remaining == 0 {
            return Some(0.0);
        }
        if self.bytes_per_second <= 0.0 {
            return None;
        }
        Some(remaining as f64 / self.bytes_per_second)
    }
}

/// Terminal event of a run: success, cancellation, or failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedEvent {
    pub cancelled: bool,
    /// Error chain when the run failed.
    pub error: Option<String>,
    /// Where the result went, on success.
    pub output: Option<DownloadOutput>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Started(StartedEvent),
    Progress(ProgressEvent),
    Completed(CompletedEvent),
}

/// Receives events from the engine. Progress events arrive on worker threads,
/// possibly from several chunks at once; keep handlers short.
pub trait DownloadListener: Send + Sync {
    fn on_event(&self, event: &DownloadEvent);
}

impl<F> DownloadListener for F
where
    F: Fn(&DownloadEvent) + Send + Sync,
{
    fn on_event(&self, event: &DownloadEvent) {
        self(event)
    }
}

/// Per-run progress accounting shared by all workers of a session.
pub(crate) struct ProgressTracker<'a> {
    listeners: &'a [Arc<dyn DownloadListener>],
    total: Option<u64>,
    received: AtomicU64,
    run_bytes: AtomicU64,
    started: Instant,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(
        listeners: &'a [Arc<dyn DownloadListener>],
        total: Option<u64>,
        already_received: u64,
    ) -> Self {
        Self {
            listeners,
            total,
            received: AtomicU64::new(already_received),
            run_bytes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub(crate) fn emit(&self, event: &DownloadEvent) {
        for listener in self.listeners {
            listener.on_event(event);
        }
    }

    /// Account for one block written by `chunk_id` and notify listeners.
    pub(crate) fn record(&self, chunk_id: usize, chunk_position: u64, block: &[u8]) {
        let n = block.len() as u64;
        let bytes_received = self.received.fetch_add(n, Ordering::AcqRel) + n;
        let run_bytes = self.run_bytes.fetch_add(n, Ordering::AcqRel) + n;
        if self.listeners.is_empty() {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let bytes_per_second = if elapsed > 0.0 {
            run_bytes as f64 / elapsed
        } else {
            0.0
        };
        self.emit(&DownloadEvent::Progress(ProgressEvent {
            chunk_id,
            chunk_position,
            bytes_received,
            total_bytes: self.total,
            received: block.to_vec(),
            bytes_per_second,
        }));
    }

    /// Forget `bytes` of a chunk restarted from its start.
    pub(crate) fn discard(&self, bytes: u64) {
        let _ = self
            .received
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(bytes))
            });
    }

    pub(crate) fn bytes_received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }
}
