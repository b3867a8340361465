//! Immutable sorted segments produced by memtable flushes and compactions.

pub mod builder;

use crate::bloom::BloomFilter;
use crate::iterator::merge::Source;
use crate::mvcc::key::EncodedKey;
use crate::types::{Entry, InternalKey};

pub use builder::SegmentBuilder;

/// Metadata about one immutable segment, as consumed by the compaction
/// batcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSegmentMeta {
    /// Smallest encoded key in the segment.
    pub smallest_key: EncodedKey,
    /// Largest encoded key in the segment.
    pub largest_key: EncodedKey,
    /// Approximate size in bytes.
    pub size_bytes: u64,
}

impl FileSegmentMeta {
    pub fn new(smallest_key: EncodedKey, largest_key: EncodedKey, size_bytes: u64) -> Self {
        FileSegmentMeta { smallest_key, largest_key, size_bytes }
    }
}

/// A frozen run of internal entries sorted by `(user_key ASC, seq DESC)`.
pub struct Segment {
    id: u64,
    entries: Vec<(InternalKey, Entry)>,
    filter: BloomFilter,
    size_bytes: u64,
}

impl Segment {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(InternalKey, Entry)] {
        &self.entries
    }

    pub fn meta(&self) -> FileSegmentMeta {
        let smallest = self.entries.first().map(|(k, _)| k.user_key.clone());
        let largest = self.entries.last().map(|(k, _)| k.user_key.clone());
        FileSegmentMeta {
            smallest_key: smallest.unwrap_or_default(),
            largest_key: largest.unwrap_or_default(),
            size_bytes: self.size_bytes,
        }
    }

    /// Whether any key of the segment falls in `[start, end]`; empty
    /// bounds are open.
    pub fn overlaps(&self, start: &EncodedKey, end: &EncodedKey) -> bool {
        let (Some((first, _)), Some((last, _))) = (self.entries.first(), self.entries.last()) else {
            return false;
        };
        (end.is_empty() || first.user_key <= *end) && (start.is_empty() || last.user_key >= *start)
    }

    fn lower_bound(&self, target: &InternalKey) -> usize {
        self.entries.partition_point(|(k, _)| k < target)
    }
}

impl Source for Segment {
    fn seek_user_key(&self, target: &EncodedKey) -> Option<EncodedKey> {
        let idx = self.lower_bound(&InternalKey::new(target.clone(), u64::MAX));
        self.entries.get(idx).map(|(k, _)| k.user_key.clone())
    }

    fn next_user_key(&self, key: &EncodedKey) -> Option<EncodedKey> {
        let idx = self.lower_bound(&InternalKey::new(key.clone(), 0));
        self.entries.get(idx).map(|(k, _)| k.user_key.clone())
    }

    fn prev_user_key(&self, key: &EncodedKey) -> Option<EncodedKey> {
        let idx = self.lower_bound(&InternalKey::new(key.clone(), u64::MAX));
        idx.checked_sub(1).map(|i| self.entries[i].0.user_key.clone())
    }

    fn last_user_key(&self) -> Option<EncodedKey> {
        self.entries.last().map(|(k, _)| k.user_key.clone())
    }

    fn collect_versions(&self, key: &EncodedKey, read_seq: u64, out: &mut Vec<(u64, Entry)>) {
        let start = self.lower_bound(&InternalKey::new(key.clone(), read_seq));
        for (ik, entry) in &self.entries[start..] {
            if ik.user_key != *key {
                break;
            }
            out.push((ik.sequence, entry.clone()));
        }
    }

    fn may_contain_prefix(&self, raw: &[u8]) -> bool {
        self.filter.may_contain(raw)
    }
}
