pub mod skiplist;

use parking_lot::RwLock;

use crate::iterator::merge::Source;
use crate::mvcc::key::EncodedKey;
use crate::types::{Entry, InternalKey};
use skiplist::SkipList;

/// In-memory sorted buffer for writes. Wraps a SkipList.
///
/// Every write goes here first. When size exceeds the threshold,
/// the memtable is frozen (becomes immutable) and flushed to a segment.
///
/// Deletes are entries of type Delete, not removals: older versions may
/// still exist in segments.
///
/// Readers take the lock per lookup rather than for the life of an
/// iterator, so long scans never block writers. Entries newer than a
/// reader's sequence are filtered out by the reader.
pub struct MemTable {
    data: RwLock<SkipList>,
    size_limit: usize,
}

impl MemTable {
    /// Create a new empty memtable with given size limit.
    pub fn new(size_limit: usize) -> Self {
        MemTable {
            data: RwLock::new(SkipList::new()),
            size_limit,
        }
    }

    pub fn insert(&self, key: InternalKey, entry: Entry) {
        self.data.write().insert(key, entry);
    }

    /// Sorted copy of all entries (including deletes), for flushing.
    pub fn entries(&self) -> Vec<(InternalKey, Entry)> {
        self.data
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Current memory usage in bytes.
    pub fn size(&self) -> usize {
        self.data.read().size_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if memtable has reached the flush threshold.
    pub fn is_full(&self) -> bool {
        self.size() >= self.size_limit
    }
}

impl Source for MemTable {
    fn seek_user_key(&self, target: &EncodedKey) -> Option<EncodedKey> {
        let list = self.data.read();
        list.seek(&InternalKey::new(target.clone(), u64::MAX))
            .map(|idx| list.node(idx).0.user_key.clone())
    }

    fn next_user_key(&self, key: &EncodedKey) -> Option<EncodedKey> {
        // Sequence 0 is never assigned, so (key, 0) sorts after every
        // version of key.
        let list = self.data.read();
        list.seek(&InternalKey::new(key.clone(), 0))
            .map(|idx| list.node(idx).0.user_key.clone())
    }

    fn prev_user_key(&self, key: &EncodedKey) -> Option<EncodedKey> {
        let list = self.data.read();
        list.seek_before(&InternalKey::new(key.clone(), u64::MAX))
            .map(|idx| list.node(idx).0.user_key.clone())
    }

    fn last_user_key(&self) -> Option<EncodedKey> {
        let list = self.data.read();
        list.last().map(|idx| list.node(idx).0.user_key.clone())
    }

    fn collect_versions(&self, key: &EncodedKey, read_seq: u64, out: &mut Vec<(u64, Entry)>) {
        let list = self.data.read();
        let mut cursor = list.seek(&InternalKey::new(key.clone(), read_seq));
        while let Some(idx) = cursor {
            let (ik, entry) = list.node(idx);
            if ik.user_key != *key {
                break;
            }
            out.push((ik.sequence, entry.clone()));
            cursor = list.next_index(idx);
        }
    }
}
