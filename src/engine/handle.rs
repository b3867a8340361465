use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{debug, error, trace};

use crate::compaction::CompactionRange;
use crate::config::Options;
use crate::engine::batch::WriteBatch;
use crate::engine::iter::{EngineIterator, IterOptions};
use crate::engine::operator::{Int64AddOperator, MergeOperator};
use crate::engine::perf::PerfCounter;
use crate::engine::EngineState;
use crate::error::{Error, Result};
use crate::iterator::merge::{MergedView, Resolved};
use crate::keys::NoSplitSpans;
use crate::mvcc::key::{EncodedKey, MvccKey};
use crate::segment::FileSegmentMeta;
use crate::types::Value;

/// Read capability, shared by live and snapshot handles.
pub trait Reader {
    /// Newest visible value of an encoded key. Absence is `Ok(None)`.
    fn get(&self, key: &MvccKey) -> Result<Option<Value>>;

    fn new_iterator(&self, options: IterOptions) -> EngineIterator;
}

/// Write capability. Only live handles have it.
pub trait Writer: Reader {
    fn put(&self, key: &MvccKey, value: &[u8]) -> Result<()> {
        let mut batch = self.new_write_batch();
        batch.put(key, value);
        self.commit_batch(batch, false)
    }

    fn merge(&self, key: &MvccKey, operand: &[u8]) -> Result<()> {
        let mut batch = self.new_write_batch();
        batch.merge(key, operand);
        self.commit_batch(batch, false)
    }

    fn delete(&self, key: &MvccKey) -> Result<()> {
        let mut batch = self.new_write_batch();
        batch.delete(key);
        self.commit_batch(batch, false)
    }

    fn delete_range(&self, start: &MvccKey, end: &MvccKey) -> Result<()> {
        let mut batch = self.new_write_batch();
        batch.delete_range(start, end);
        self.commit_batch(batch, false)
    }

    fn new_write_batch(&self) -> WriteBatch {
        WriteBatch::new()
    }

    /// Applies every mutation of `batch` atomically; with `sync` the WAL is
    /// fsync'd before returning.
    fn commit_batch(&self, batch: WriteBatch, sync: bool) -> Result<()>;

    /// Applies a batch given in its byte representation.
    fn apply_batch_repr(&self, repr: &[u8], sync: bool) -> Result<()> {
        self.commit_batch(WriteBatch::from_repr(repr)?, sync)
    }
}

fn get_from(view: &MergedView, key: &MvccKey) -> Result<Option<Value>> {
    match view.resolve(&key.encode())? {
        Resolved::Value(value) => Ok(Some(value)),
        Resolved::Deleted | Resolved::Absent => Ok(None),
    }
}

/// Read-write handle over an open engine.
///
/// Iterators and snapshots derived from the handle keep the engine state
/// alive on their own; the handle counts them so that closing it early is
/// reported instead of going unnoticed.
pub struct LiveHandle {
    state: Arc<EngineState>,
    closed: bool,
}

impl LiveHandle {
    pub fn open(options: Options) -> Result<Self> {
        Self::open_with_merge_operator(options, Arc::new(Int64AddOperator))
    }

    pub fn open_with_merge_operator(options: Options, merge_operator: Arc<dyn MergeOperator>) -> Result<Self> {
        let state = EngineState::open(options, merge_operator)?;
        Ok(LiveHandle { state, closed: false })
    }

    /// A read-only view pinned at the latest committed batch.
    pub fn new_snapshot(&self) -> SnapshotHandle {
        let sequence = self.state.pin_snapshot();
        trace!(sequence, "snapshot created");
        SnapshotHandle { state: self.state.clone(), sequence }
    }

    /// Freezes the memtable into a segment.
    pub fn flush(&self) -> Result<()> {
        self.state.flush()
    }

    pub fn live_segments(&self) -> Vec<FileSegmentMeta> {
        self.state.live_segments()
    }

    /// Compacts every live segment in ranges of the configured
    /// `compaction_target_size`, honoring the default no-split spans.
    pub fn compact(&self) -> Result<Vec<CompactionRange>> {
        let target_size = self.state.options.compaction_target_size;
        self.compact_range(&EncodedKey::empty(), &EncodedKey::empty(), target_size)
    }

    /// Compacts the segments overlapping `[start, end)` in ranges of about
    /// `target_size` bytes, honoring the default no-split spans. Empty
    /// bounds are open. Returns the ranges that were compacted.
    pub fn compact_range(&self, start: &EncodedKey, end: &EncodedKey, target_size: u64) -> Result<Vec<CompactionRange>> {
        self.compact_range_with_spans(start, end, target_size, &NoSplitSpans::default())
    }

    pub fn compact_range_with_spans(
        &self,
        start: &EncodedKey,
        end: &EncodedKey,
        target_size: u64,
        spans: &NoSplitSpans,
    ) -> Result<Vec<CompactionRange>> {
        self.state.compact_range(start, end, target_size, spans)
    }

    /// Handle-wide value of a perf counter.
    pub fn perf_counter(&self, counter: PerfCounter) -> u64 {
        self.state.counters.get(counter)
    }

    /// Sequence number of the latest committed operation.
    pub fn sequence(&self) -> u64 {
        self.state.visible_seq()
    }

    fn outstanding(&self) -> (usize, usize) {
        (
            self.state.live_iterators.load(Ordering::SeqCst),
            self.state.live_snapshots.load(Ordering::SeqCst),
        )
    }

    /// Closes the handle. Fails with `UseAfterClose` while iterators or
    /// snapshots created from it are still alive.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        let (iterators, snapshots) = self.outstanding();
        if iterators > 0 || snapshots > 0 {
            error!(iterators, snapshots, "handle closed with live resources");
            return Err(Error::UseAfterClose { iterators, snapshots });
        }
        if let Some(wal) = self.state.commit.lock().wal.as_mut() {
            wal.sync()?;
        }
        debug!(sequence = self.sequence(), "engine closed");
        Ok(())
    }
}

impl Reader for LiveHandle {
    fn get(&self, key: &MvccKey) -> Result<Option<Value>> {
        get_from(&self.state.live_view(), key)
    }

    fn new_iterator(&self, options: IterOptions) -> EngineIterator {
        EngineIterator::new(self.state.clone(), self.state.live_view(), options)
    }
}

impl Writer for LiveHandle {
    fn commit_batch(&self, batch: WriteBatch, sync: bool) -> Result<()> {
        self.state.commit(batch.record(), sync)
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let (iterators, snapshots) = self.outstanding();
        if iterators > 0 || snapshots > 0 {
            error!(iterators, snapshots, "handle dropped with live resources");
        }
    }
}

/// Point-in-time, read-only view of a live handle.
///
/// Exposes only [`Reader`]; a snapshot cannot be written through.
pub struct SnapshotHandle {
    state: Arc<EngineState>,
    sequence: u64,
}

impl SnapshotHandle {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Reader for SnapshotHandle {
    fn get(&self, key: &MvccKey) -> Result<Option<Value>> {
        get_from(&self.state.snapshot_view(self.sequence), key)
    }

    fn new_iterator(&self, options: IterOptions) -> EngineIterator {
        EngineIterator::new(self.state.clone(), self.state.snapshot_view(self.sequence), options)
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        self.state.unpin_snapshot(self.sequence);
        trace!(sequence = self.sequence, "snapshot released");
    }
}
