//! The reference ordered engine behind the handles.
//!
//! Write path:
//!   commit_batch → WAL (optional) → memtable → publish sequence
//!   memtable full → flush to an immutable segment
//!
//! Read path:
//!   capture (version, read sequence) → merge memtable + segments
//!   → newest visible entry per encoded key

pub mod batch;
pub mod handle;
pub mod iter;
pub mod operator;
pub mod perf;

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::compaction::{CompactionRange, batch_for_compaction};
use crate::config::Options;
use crate::error::Result;
use crate::iterator::merge::{MergedView, Source};
use crate::keys::NoSplitSpans;
use crate::memtable::MemTable;
use crate::mvcc::key::EncodedKey;
use crate::segment::{FileSegmentMeta, Segment, SegmentBuilder};
use crate::types::{Entry, InternalKey, RangeTombstone, ValueType};
use crate::wal::{BatchRecord, RecordType, WAL_FILE_NAME, WALReader, WALWriter};
use operator::MergeOperator;
use perf::PerfCounters;

pub use batch::WriteBatch;
pub use handle::{LiveHandle, Reader, SnapshotHandle, Writer};
pub use iter::{EngineIterator, IterOptions};
pub use operator::{AppendOperator, Int64AddOperator};
pub use perf::{IteratorStats, PerfCounter, PerfScope, with_perf_scope};

/// The memtable and segment list a reader works against.
pub(crate) struct Version {
    memtable: Arc<MemTable>,
    segments: Vec<Arc<Segment>>,
}

impl Version {
    fn sources(&self) -> Vec<Arc<dyn Source>> {
        let mut sources: Vec<Arc<dyn Source>> = Vec::with_capacity(self.segments.len() + 1);
        sources.push(self.memtable.clone());
        for segment in &self.segments {
            sources.push(segment.clone());
        }
        sources
    }
}

/// State guarded by the commit mutex.
struct CommitState {
    wal: Option<WALWriter>,
}

/// Shared state behind a live handle and everything derived from it.
pub(crate) struct EngineState {
    options: Options,
    merge_operator: Arc<dyn MergeOperator>,
    version: RwLock<Arc<Version>>,
    range_tombstones: RwLock<Arc<Vec<RangeTombstone>>>,
    commit: Mutex<CommitState>,
    /// Highest sequence whose batch is fully applied.
    visible_seq: AtomicU64,
    /// Read sequences pinned by snapshots, with pin counts.
    snapshots: Mutex<BTreeMap<u64, usize>>,
    next_segment_id: AtomicU64,
    pub(crate) live_iterators: AtomicUsize,
    pub(crate) live_snapshots: AtomicUsize,
    pub(crate) counters: PerfCounters,
}

impl EngineState {
    fn open(options: Options, merge_operator: Arc<dyn MergeOperator>) -> Result<Arc<Self>> {
        options.validate()?;

        let memtable = Arc::new(MemTable::new(options.memtable_size_limit));
        let state = Arc::new(EngineState {
            merge_operator,
            version: RwLock::new(Arc::new(Version { memtable, segments: Vec::new() })),
            range_tombstones: RwLock::new(Arc::new(Vec::new())),
            commit: Mutex::new(CommitState { wal: None }),
            visible_seq: AtomicU64::new(0),
            snapshots: Mutex::new(BTreeMap::new()),
            next_segment_id: AtomicU64::new(1),
            live_iterators: AtomicUsize::new(0),
            live_snapshots: AtomicUsize::new(0),
            counters: PerfCounters::default(),
            options,
        });

        if let Some(dir) = state.options.wal_dir.clone() {
            fs::create_dir_all(&dir)?;
            let path = dir.join(WAL_FILE_NAME);
            let reader = WALReader::new(&path)?;
            let mut records = reader.iter();
            let mut replayed = 0usize;
            {
                let mut commit = state.commit.lock();
                for record in records.by_ref() {
                    state.apply_locked(&mut commit, &record)?;
                    if state.current_version().memtable.is_full() {
                        state.flush_locked(&mut commit)?;
                    }
                    replayed += 1;
                }
            }
            let valid_len = records.offset();
            if valid_len < reader.len() {
                warn!(
                    path = %path.display(),
                    valid_len,
                    file_len = reader.len(),
                    "WAL replay stopped at a corrupt record, truncating tail"
                );
            }
            state.commit.lock().wal = Some(WALWriter::open(&path, valid_len)?);
            debug!(path = %path.display(), replayed, "WAL replayed");
        }

        debug!(
            memtable_size_limit = state.options.memtable_size_limit,
            merge_operator = state.merge_operator.name(),
            "engine opened"
        );
        Ok(state)
    }

    pub(crate) fn visible_seq(&self) -> u64 {
        self.visible_seq.load(Ordering::Acquire)
    }

    fn current_version(&self) -> Arc<Version> {
        self.version.read().clone()
    }

    /// A merged view at the latest visible sequence.
    pub(crate) fn live_view(&self) -> MergedView {
        let (version, read_seq) = {
            let guard = self.version.read();
            (guard.clone(), self.visible_seq())
        };
        self.view_at(&version, read_seq)
    }

    pub(crate) fn view_at(&self, version: &Version, read_seq: u64) -> MergedView {
        MergedView::new(
            version.sources(),
            self.range_tombstones.read().clone(),
            read_seq,
            self.merge_operator.clone(),
        )
    }

    pub(crate) fn snapshot_view(&self, read_seq: u64) -> MergedView {
        self.view_at(&self.current_version(), read_seq)
    }

    /// Pins the latest visible sequence; compaction keeps every version a
    /// pinned reader can observe.
    pub(crate) fn pin_snapshot(&self) -> u64 {
        let _version = self.version.read();
        let seq = self.visible_seq();
        *self.snapshots.lock().entry(seq).or_insert(0) += 1;
        self.live_snapshots.fetch_add(1, Ordering::SeqCst);
        seq
    }

    pub(crate) fn unpin_snapshot(&self, seq: u64) {
        let mut snapshots = self.snapshots.lock();
        if let Some(count) = snapshots.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                snapshots.remove(&seq);
            }
        }
        self.live_snapshots.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn commit(&self, record: &BatchRecord, sync: bool) -> Result<()> {
        if record.ops.is_empty() {
            return Ok(());
        }
        let mut commit = self.commit.lock();
        if let Some(wal) = commit.wal.as_mut() {
            wal.append(record, sync)?;
        }
        self.apply_locked(&mut commit, record)?;
        if self.current_version().memtable.is_full() {
            self.flush_locked(&mut commit)?;
        }
        Ok(())
    }

    /// Applies a record to the memtable and publishes its sequences. The
    /// caller holds the commit lock.
    fn apply_locked(&self, _commit: &mut CommitState, record: &BatchRecord) -> Result<()> {
        let memtable = self.current_version().memtable.clone();
        let mut seq = self.visible_seq();
        let mut tombstones = Vec::new();
        for op in &record.ops {
            seq += 1;
            let key = EncodedKey::from_vec(op.key.clone());
            match op.record_type {
                RecordType::Put => memtable.insert(InternalKey::new(key, seq), Entry::put(op.value.clone())),
                RecordType::Delete => memtable.insert(InternalKey::new(key, seq), Entry::delete()),
                RecordType::Merge => memtable.insert(InternalKey::new(key, seq), Entry::merge(op.value.clone())),
                RecordType::DeleteRange => tombstones.push(RangeTombstone {
                    start: key,
                    end: EncodedKey::from_vec(op.value.clone()),
                    sequence: seq,
                }),
            }
        }
        if !tombstones.is_empty() {
            let mut guard = self.range_tombstones.write();
            let mut all = guard.as_ref().clone();
            all.extend(tombstones);
            *guard = Arc::new(all);
        }
        self.visible_seq.store(seq, Ordering::Release);
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<()> {
        let mut commit = self.commit.lock();
        self.flush_locked(&mut commit)
    }

    fn flush_locked(&self, _commit: &mut CommitState) -> Result<()> {
        let current = self.current_version();
        if current.memtable.is_empty() {
            return Ok(());
        }

        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let mut builder = SegmentBuilder::new(id, self.options.bloom_false_positive_rate);
        for (key, entry) in current.memtable.entries() {
            builder.add(key, entry)?;
        }
        let segment = Arc::new(builder.finish());
        debug!(segment = id, entries = segment.len(), size = segment.meta().size_bytes, "memtable flushed");

        let mut segments = Vec::with_capacity(current.segments.len() + 1);
        segments.push(segment);
        segments.extend(current.segments.iter().cloned());
        *self.version.write() = Arc::new(Version {
            memtable: Arc::new(MemTable::new(self.options.memtable_size_limit)),
            segments,
        });
        Ok(())
    }

    /// Segment metadata sorted by smallest key.
    pub(crate) fn live_segments(&self) -> Vec<FileSegmentMeta> {
        let mut metas: Vec<FileSegmentMeta> = self
            .current_version()
            .segments
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.meta())
            .collect();
        metas.sort_by(|a, b| a.smallest_key.cmp(&b.smallest_key));
        metas
    }

    pub(crate) fn compact_range(
        &self,
        start: &EncodedKey,
        end: &EncodedKey,
        target_size: u64,
        spans: &NoSplitSpans,
    ) -> Result<Vec<CompactionRange>> {
        let mut commit = self.commit.lock();
        self.flush_locked(&mut commit)?;

        let ranges = batch_for_compaction(&self.live_segments(), start, end, target_size, spans)?;
        let drop_shadowed = self.snapshots.lock().is_empty();
        debug!(ranges = ranges.len(), drop_shadowed, "compacting");

        for range in &ranges {
            let current = self.current_version();
            let (inputs, kept): (Vec<_>, Vec<_>) = current
                .segments
                .iter()
                .cloned()
                .partition(|s| s.overlaps(&range.start, &range.end) && !touches_only_end(s, &range.end));
            if inputs.is_empty() || (inputs.len() < 2 && !drop_shadowed) {
                continue;
            }

            let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
            let merged = merge_segments(id, &inputs, drop_shadowed, self.options.bloom_false_positive_rate)?;
            let input_ids: Vec<u64> = inputs.iter().map(|s| s.id()).collect();
            debug!(
                ?range,
                inputs = ?input_ids,
                output = id,
                entries = merged.len(),
                "compacted range"
            );

            let mut segments = kept;
            if !merged.is_empty() {
                segments.push(Arc::new(merged));
            }
            *self.version.write() = Arc::new(Version { memtable: current.memtable.clone(), segments });
        }
        Ok(ranges)
    }
}

/// A segment whose only overlap with a half-open range is at its exclusive
/// end key does not belong to the range.
fn touches_only_end(segment: &Segment, end: &EncodedKey) -> bool {
    !end.is_empty() && segment.meta().smallest_key >= *end
}

/// Merges the entries of `inputs` into one segment. With `drop_shadowed`,
/// versions below a newer put or delete of the same encoded key are dropped.
fn merge_segments(id: u64, inputs: &[Arc<Segment>], drop_shadowed: bool, fpr: f64) -> Result<Segment> {
    let mut entries: Vec<(InternalKey, Entry)> = inputs
        .iter()
        .flat_map(|s| s.entries().iter().cloned())
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut builder = SegmentBuilder::new(id, fpr);
    let mut shadowed: Option<EncodedKey> = None;
    for (key, entry) in entries {
        if drop_shadowed && shadowed.as_ref() == Some(&key.user_key) {
            continue;
        }
        shadowed = match entry.value_type {
            ValueType::Put | ValueType::Delete => Some(key.user_key.clone()),
            ValueType::Merge => None,
        };
        builder.add(key, entry)?;
    }
    Ok(builder.finish())
}
