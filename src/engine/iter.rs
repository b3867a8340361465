use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::trace;

use crate::engine::EngineState;
use crate::engine::perf::{IteratorStats, PerfCounter, PerfCounters};
use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::iterator::merge::{MergedView, Resolved};
use crate::mvcc::key::{EncodedKey, MvccKey, raw_key};

/// Options recognized when creating an iterator.
#[derive(Debug, Clone)]
pub struct IterOptions {
    /// Inclusive lower bound.
    pub lower_bound: Option<MvccKey>,
    /// Exclusive upper bound.
    pub upper_bound: Option<MvccKey>,
    /// Restrict iteration to the raw key of the last seek target.
    pub prefix_seek: bool,
    /// Surface MVCC deletion tombstones (empty values at versioned keys).
    pub include_tombstones: bool,
    /// Capture perf counter deltas in scoped scans.
    pub with_stats: bool,
}

impl Default for IterOptions {
    fn default() -> Self {
        IterOptions {
            lower_bound: None,
            upper_bound: None,
            prefix_seek: false,
            include_tombstones: true,
            with_stats: false,
        }
    }
}

/// A cursor over the encoded keys of one handle at a fixed read sequence.
///
/// The iterator captures the memtable and segment list current at
/// creation, so later writes, flushes and compactions never move it.
/// Each step re-seeks the merged sources from the current key, which
/// makes direction changes free.
pub struct EngineIterator {
    state: Arc<EngineState>,
    view: MergedView,
    /// Raw prefix and filtered view of the last prefix seek.
    prefix: Option<(Vec<u8>, MergedView)>,
    lower: Option<EncodedKey>,
    upper: Option<EncodedKey>,
    prefix_seek: bool,
    include_tombstones: bool,
    with_stats: bool,
    current: Option<(EncodedKey, Vec<u8>)>,
    counters: PerfCounters,
    stats: IteratorStats,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Reverse,
}

impl EngineIterator {
    pub(crate) fn new(state: Arc<EngineState>, view: MergedView, options: IterOptions) -> Self {
        state.live_iterators.fetch_add(1, Ordering::SeqCst);
        trace!(read_seq = view.read_seq(), "iterator created");
        EngineIterator {
            state,
            view,
            prefix: None,
            lower: options.lower_bound.as_ref().map(MvccKey::encode),
            upper: options.upper_bound.as_ref().map(MvccKey::encode),
            prefix_seek: options.prefix_seek,
            include_tombstones: options.include_tombstones,
            with_stats: options.with_stats,
            current: None,
            counters: PerfCounters::default(),
            stats: IteratorStats::default(),
        }
    }

    /// The current key, decoded.
    pub fn mvcc_key(&self) -> Result<MvccKey> {
        MvccKey::decode(self.key())
    }

    /// Counter deltas folded in by perf scopes so far.
    pub fn stats(&self) -> IteratorStats {
        self.stats
    }

    pub(crate) fn stats_enabled(&self) -> bool {
        self.with_stats
    }

    pub(crate) fn counters(&self) -> &PerfCounters {
        &self.counters
    }

    pub(crate) fn counters_and_stats_mut(&mut self) -> (&PerfCounters, &mut IteratorStats) {
        (&self.counters, &mut self.stats)
    }

    fn active(&self) -> &MergedView {
        match &self.prefix {
            Some((_, view)) => view,
            None => &self.view,
        }
    }

    fn count_skip(&self) {
        self.counters.add(PerfCounter::InternalDeleteSkippedCount, 1);
        self.state.counters.add(PerfCounter::InternalDeleteSkippedCount, 1);
    }

    fn in_bounds(&self, key: &EncodedKey) -> bool {
        if self.lower.as_ref().is_some_and(|lower| key < lower) {
            return false;
        }
        if self.upper.as_ref().is_some_and(|upper| key >= upper) {
            return false;
        }
        match &self.prefix {
            Some((raw, _)) => raw_key(key.as_bytes()) == raw.as_slice(),
            None => true,
        }
    }

    /// Walks from `candidate` until a visible entry or the edge of the view.
    fn settle(&self, mut candidate: Option<EncodedKey>, direction: Direction) -> Result<Option<(EncodedKey, Vec<u8>)>> {
        while let Some(key) = candidate {
            if !self.in_bounds(&key) {
                return Ok(None);
            }
            match self.active().resolve(&key)? {
                Resolved::Value(value) => {
                    let hidden = !self.include_tombstones
                        && value.is_empty()
                        && MvccKey::decode(key.as_bytes()).is_ok_and(|k| k.is_value());
                    if !hidden {
                        return Ok(Some((key, value)));
                    }
                }
                Resolved::Deleted => self.count_skip(),
                Resolved::Absent => {}
            }
            candidate = match direction {
                Direction::Forward => self.active().next_after(&key),
                Direction::Reverse => self.active().prev_before(&key),
            };
        }
        Ok(None)
    }

    fn set_prefix(&mut self, target: &[u8]) {
        if self.prefix_seek {
            let raw = raw_key(target).to_vec();
            let view = self.view.restrict_to_prefix(&raw);
            self.prefix = Some((raw, view));
        }
    }
}

impl StorageIterator for EngineIterator {
    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|(k, _)| k.as_bytes()).unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map(|(_, v)| v.as_slice()).unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> Result<()> {
        let Some((key, _)) = &self.current else {
            return Ok(());
        };
        let candidate = self.active().next_after(key);
        self.current = self.settle(candidate, Direction::Forward)?;
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        let Some((key, _)) = &self.current else {
            return Ok(());
        };
        let candidate = self.active().prev_before(key);
        self.current = self.settle(candidate, Direction::Reverse)?;
        Ok(())
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.set_prefix(key);
        let mut target = EncodedKey::from_vec(key.to_vec());
        if let Some(lower) = &self.lower {
            if target < *lower {
                target = lower.clone();
            }
        }
        let candidate = self.active().seek(&target);
        self.current = self.settle(candidate, Direction::Forward)?;
        Ok(())
    }

    fn seek_for_prev(&mut self, key: &[u8]) -> Result<()> {
        self.set_prefix(key);
        let target = EncodedKey::from_vec(key.to_vec());
        let candidate = match &self.upper {
            Some(upper) if target >= *upper => self.active().prev_before(upper),
            _ => match self.active().seek(&target) {
                Some(found) if found == target => Some(found),
                _ => self.active().prev_before(&target),
            },
        };
        self.current = self.settle(candidate, Direction::Reverse)?;
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.prefix = None;
        let start = self.lower.clone().unwrap_or_default();
        let candidate = self.view.seek(&start);
        self.current = self.settle(candidate, Direction::Forward)?;
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<()> {
        self.prefix = None;
        let candidate = match &self.upper {
            Some(upper) => self.view.prev_before(upper),
            None => self.view.last(),
        };
        self.current = self.settle(candidate, Direction::Reverse)?;
        Ok(())
    }
}

impl Drop for EngineIterator {
    fn drop(&mut self) {
        self.state.live_iterators.fetch_sub(1, Ordering::SeqCst);
        trace!(read_seq = self.view.read_seq(), "iterator released");
    }
}
