//! Cooperative cancellation.
//!
//! The service hands a clone of its `CancelHandle` to every worker; workers
//! check it before each attempt and at every block boundary and stop with
//! their cursor intact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancel flag. Clones observe the same flag, so a handle taken from
/// the service before `start` can cancel from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Running workers stop at their next block.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear a previous request before a new run.
    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
