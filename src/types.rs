use std::cmp::Ordering;

use crate::mvcc::key::EncodedKey;

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Distinguishes the kinds of entries the engine stores.
/// A Delete writes a tombstone: the key isn't removed, it's marked as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// A normal put operation.
    Put = 0x01,
    /// A delete (tombstone marker).
    Delete = 0x02,
    /// A merge operand, folded into older values at read time.
    Merge = 0x03,
}

/// Internal key format: encoded MVCC key + sequence number.
///
/// Ordering: (user_key ASC by the MVCC comparator, sequence DESC).
/// The newest write of an encoded key always comes first, so a forward
/// walk sees the version a reader should resolve against before any
/// older one.
///
/// Sequence numbers start at 1 and are assigned per committed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    pub user_key: EncodedKey,
    pub sequence: u64,
}

impl InternalKey {
    pub fn new(user_key: EncodedKey, sequence: u64) -> Self {
        InternalKey { user_key, sequence }
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The value half of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value_type: ValueType,
    pub value: Value,
}

impl Entry {
    pub fn put(value: Value) -> Self {
        Entry { value_type: ValueType::Put, value }
    }

    pub fn delete() -> Self {
        Entry { value_type: ValueType::Delete, value: Vec::new() }
    }

    pub fn merge(value: Value) -> Self {
        Entry { value_type: ValueType::Merge, value }
    }
}

/// A `[start, end)` deletion of encoded keys. An empty `end` reaches the
/// end of the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeTombstone {
    pub start: EncodedKey,
    pub end: EncodedKey,
    pub sequence: u64,
}

impl RangeTombstone {
    pub fn covers(&self, key: &EncodedKey) -> bool {
        *key >= self.start && (self.end.is_empty() || *key < self.end)
    }
}
