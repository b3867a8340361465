//! Scoped perf counters.
//!
//! Counters are monotonic. Each iterator keeps its own set (it is driven by
//! one thread at a time) and mirrors every increment into the handle-wide
//! set. A perf scope snapshots the iterator's counters on entry and folds
//! the delta into the iterator's [`IteratorStats`] on exit, whether the
//! scoped closure returns, fails or panics.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::iter::EngineIterator;

const NUM_COUNTERS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerfCounter {
    /// Entries hidden by a point delete or a range tombstone that an
    /// iterator stepped over.
    InternalDeleteSkippedCount,
}

impl PerfCounter {
    pub const ALL: [PerfCounter; NUM_COUNTERS] = [PerfCounter::InternalDeleteSkippedCount];

    fn index(self) -> usize {
        match self {
            PerfCounter::InternalDeleteSkippedCount => 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct PerfCounters {
    values: [AtomicU64; NUM_COUNTERS],
}

impl PerfCounters {
    pub fn get(&self, counter: PerfCounter) -> u64 {
        self.values[counter.index()].load(Ordering::Relaxed)
    }

    pub fn add(&self, counter: PerfCounter, n: u64) {
        self.values[counter.index()].fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self) -> [u64; NUM_COUNTERS] {
        let mut out = [0; NUM_COUNTERS];
        for counter in PerfCounter::ALL {
            out[counter.index()] = self.get(counter);
        }
        out
    }
}

/// Counter deltas accumulated by perf scopes run over one iterator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IteratorStats {
    pub internal_delete_skipped_count: u64,
}

impl IteratorStats {
    fn fold(&mut self, counter: PerfCounter, delta: u64) {
        match counter {
            PerfCounter::InternalDeleteSkippedCount => self.internal_delete_skipped_count += delta,
        }
    }
}

/// Baseline values captured when a scope begins.
#[derive(Debug)]
pub struct PerfScope {
    baseline: [u64; NUM_COUNTERS],
}

impl PerfScope {
    pub fn begin(counters: &PerfCounters) -> Self {
        PerfScope { baseline: counters.snapshot() }
    }

    /// Adds the change since `begin` into `stats`.
    pub fn end(self, counters: &PerfCounters, stats: &mut IteratorStats) {
        let now = counters.snapshot();
        for counter in PerfCounter::ALL {
            let i = counter.index();
            stats.fold(counter, now[i].saturating_sub(self.baseline[i]));
        }
    }
}

/// Runs `f` over `iter` inside a perf scope.
///
/// Without `with_stats` on the iterator, `f` runs directly. Otherwise the
/// counter delta is folded into the iterator's stats on every exit path;
/// a panic inside `f` is resumed after folding.
pub fn with_perf_scope<T>(iter: &mut EngineIterator, f: impl FnOnce(&mut EngineIterator) -> T) -> T {
    if !iter.stats_enabled() {
        return f(iter);
    }

    let scope = PerfScope::begin(iter.counters());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *iter)));
    let (counters, stats) = iter.counters_and_stats_mut();
    scope.end(counters, stats);
    match outcome {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}
