//! Per-worker counters and load-balance scoring
//!
//! Slot 0 holds the aggregate, slot `i + 1` belongs to worker `i`. Worker
//! slots are only written by the job running on that worker, so relaxed
//! atomics are enough. The aggregate slot is written by [`Metrics::aggregate`],
//! which callers run after the pool has drained.

use crate::pool::Worker;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Snapshot of one slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub lookups: u64,
    pub added: u64,
    pub removed: u64,
    pub updated: u64,
}

impl Counters {
    /// Total work units recorded in this slot
    #[must_use]
    pub const fn activity(&self) -> u64 {
        self.lookups + self.added + self.removed + self.updated
    }

    fn accumulate(&mut self, other: &Self) {
        self.lookups += other.lookups;
        self.added += other.added;
        self.removed += other.removed;
        self.updated += other.updated;
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lookups={} added={} removed={} updated={}",
            self.lookups, self.added, self.removed, self.updated
        )
    }
}

#[derive(Default)]
struct Slot {
    lookups: AtomicU64,
    added: AtomicU64,
    removed: AtomicU64,
    updated: AtomicU64,
}

impl Slot {
    fn load(&self) -> Counters {
        Counters {
            lookups: self.lookups.load(Ordering::Relaxed),
            added: self.added.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
        }
    }

    fn store(&self, counters: &Counters) {
        self.lookups.store(counters.lookups, Ordering::Relaxed);
        self.added.store(counters.added, Ordering::Relaxed);
        self.removed.store(counters.removed, Ordering::Relaxed);
        self.updated.store(counters.updated, Ordering::Relaxed);
    }
}

/// Which counter to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Lookup,
    Added,
    Removed,
    Updated,
}

/// Result of [`Metrics::aggregate`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    pub total: Counters,
    pub per_worker: Vec<Counters>,
    /// Load-balance score, higher is more even
    pub spread: f64,
}

/// Counter slots for every worker plus the aggregate
pub struct Metrics {
    slots: Vec<Slot>,
}

impl Metrics {
    /// Allocate `workers + 1` slots
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..=workers).map(|_| Slot::default()).collect(),
        }
    }

    /// Number of worker slots
    #[must_use]
    pub fn workers(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn record(&self, worker: Worker, counter: Counter) {
        let Some(slot) = self.slots.get(worker.index() + 1) else {
            warn!(worker = worker.index(), "No metrics slot for worker");
            return;
        };
        let cell = match counter {
            Counter::Lookup => &slot.lookups,
            Counter::Added => &slot.added,
            Counter::Removed => &slot.removed,
            Counter::Updated => &slot.updated,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters of one worker
    #[must_use]
    pub fn worker(&self, worker: Worker) -> Counters {
        self.slots
            .get(worker.index() + 1)
            .map(Slot::load)
            .unwrap_or_default()
    }

    /// Sum the worker slots into the aggregate slot and score the spread
    pub fn aggregate(&self) -> MetricsReport {
        let per_worker: Vec<Counters> = self.slots[1..].iter().map(Slot::load).collect();
        let mut total = Counters::default();
        for counters in &per_worker {
            total.accumulate(counters);
        }
        self.slots[0].store(&total);

        let activity: Vec<u64> = per_worker.iter().map(Counters::activity).collect();
        MetricsReport {
            total,
            spread: spread(&activity),
            per_worker,
        }
    }

    /// Last aggregate written by [`Metrics::aggregate`]
    #[must_use]
    pub fn total(&self) -> Counters {
        self.slots[0].load()
    }
}

/// Score how evenly `activity` is spread over the workers.
///
/// `|mean - stddev| / mean * 100`, using the population standard deviation.
/// Identical activity scores 100. The value is informational and can leave
/// `0..=100` for skewed inputs. No activity at all scores 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn spread(activity: &[u64]) -> f64 {
    if activity.is_empty() {
        return 0.0;
    }
    let n = activity.len() as f64;
    let mean = activity.iter().map(|&a| a as f64).sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = activity
        .iter()
        .map(|&a| {
            let d = a as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean - variance.sqrt()).abs() / mean * 100.0
}
