/*!
 * Lock-Free Lifecycle Statistics
 * Atomic counters updated outside the allocator and registry locks
 */

use super::types::{ExitOutcome, OwnTransition};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the lifecycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LifecycleStats {
    pub forks: u64,
    pub fork_failures: u64,
    pub exits: u64,
    pub waits: u64,
    pub broadcasts: u64,
    pub zombies: u64,
    pub reclaimed: u64,
    pub orphaned: u64,
}

/// Atomic lifecycle statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Relaxed ordering; snapshots are not a consistent cut
#[repr(C, align(64))]
#[derive(Default)]
pub struct AtomicLifecycleStats {
    forks: AtomicU64,
    fork_failures: AtomicU64,
    exits: AtomicU64,
    waits: AtomicU64,
    broadcasts: AtomicU64,
    zombies: AtomicU64,
    reclaimed: AtomicU64,
    orphaned: AtomicU64,
}

impl AtomicLifecycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn inc_forks(&self) {
        self.forks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_fork_failures(&self) {
        self.fork_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_waits(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one exit pass into the counters
    pub fn record_exit(&self, outcome: &ExitOutcome) {
        self.exits.fetch_add(1, Ordering::Relaxed);
        if outcome.broadcast {
            self.broadcasts.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.own == OwnTransition::Zombie {
            self.zombies.fetch_add(1, Ordering::Relaxed);
        }
        self.reclaimed
            .fetch_add(outcome.reclaimed.len() as u64, Ordering::Relaxed);
        self.orphaned
            .fetch_add(outcome.orphaned.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LifecycleStats {
        LifecycleStats {
            forks: self.forks.load(Ordering::Relaxed),
            fork_failures: self.fork_failures.load(Ordering::Relaxed),
            exits: self.exits.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            zombies: self.zombies.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
        }
    }
}
