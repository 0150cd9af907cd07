//! Session bandwidth budget shared by chunk workers.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::UNLIMITED;

/// Aggregate bandwidth ceiling divided evenly across active workers.
///
/// Workers call [`BandwidthBudget::join`] when they start and hold the
/// returned share until they finish; the per-worker share is recomputed from
/// the live worker count on every read, so bandwidth freed by a finishing
/// worker is picked up by the others at their next block.
#[derive(Debug)]
pub struct BandwidthBudget {
    total: u64,
    active: AtomicUsize,
}

impl BandwidthBudget {
    /// Budget of `total` bytes per second (`UNLIMITED` for no cap).
    pub fn new(total: u64) -> Self {
        Self {
            total,
            active: AtomicUsize::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(UNLIMITED)
    }

    /// Aggregate ceiling.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of workers currently holding a share.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Current per-worker ceiling. Never zero.
    pub fn per_worker(&self) -> u64 {
        if self.total == UNLIMITED {
            return UNLIMITED;
        }
        let active = self.active().max(1) as u64;
        (self.total / active).max(1)
    }

    /// Register a running worker. The share is released when dropped.
    pub fn join(&self) -> BudgetShare<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        BudgetShare { budget: self }
    }
}

/// One worker's claim on a [`BandwidthBudget`].
#[derive(Debug)]
pub struct BudgetShare<'a> {
    budget: &'a BandwidthBudget,
}

impl BudgetShare<'_> {
    /// This worker's ceiling right now.
    pub fn limit(&self) -> u64 {
        self.budget.per_worker()
    }
}

impl Drop for BudgetShare<'_> {
    fn drop(&mut self) {
        self.budget.active.fetch_sub(1, Ordering::AcqRel);
    }
}
