use std::sync::Arc;

use crate::engine::operator::MergeOperator;
use crate::error::Result;
use crate::mvcc::key::EncodedKey;
use crate::types::{Entry, RangeTombstone, ValueType};

/// A sorted data source holding internal entries: the memtable or an
/// immutable segment.
///
/// Positioning works on user keys (encoded MVCC keys); all versions of a
/// user key are gathered through `collect_versions`.
pub(crate) trait Source: Send + Sync {
    /// Smallest user key >= target.
    fn seek_user_key(&self, target: &EncodedKey) -> Option<EncodedKey>;

    /// Smallest user key > key.
    fn next_user_key(&self, key: &EncodedKey) -> Option<EncodedKey>;

    /// Largest user key < key.
    fn prev_user_key(&self, key: &EncodedKey) -> Option<EncodedKey>;

    /// Largest user key.
    fn last_user_key(&self) -> Option<EncodedKey>;

    /// Appends every entry of `key` with sequence <= read_seq.
    fn collect_versions(&self, key: &EncodedKey, read_seq: u64, out: &mut Vec<(u64, Entry)>);

    /// False if no key with this raw prefix can be in the source.
    fn may_contain_prefix(&self, _raw: &[u8]) -> bool {
        true
    }
}

/// Result of resolving one user key against a read sequence.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Resolved {
    Value(Vec<u8>),
    /// Hidden by a point delete or a covering range tombstone.
    Deleted,
    /// No entry visible at the read sequence.
    Absent,
}

/// Merges multiple sorted sources into a single view at a fixed read
/// sequence.
///
/// Ordering guarantee: user keys come out in MVCC comparator order.
/// For each user key only the newest visible entry wins; merge operands
/// are folded onto the newest put below them, and a range tombstone
/// newer than an entry hides it.
#[derive(Clone)]
pub(crate) struct MergedView {
    sources: Vec<Arc<dyn Source>>,
    tombstones: Arc<Vec<RangeTombstone>>,
    read_seq: u64,
    merge_operator: Arc<dyn MergeOperator>,
}

impl MergedView {
    pub fn new(
        sources: Vec<Arc<dyn Source>>,
        tombstones: Arc<Vec<RangeTombstone>>,
        read_seq: u64,
        merge_operator: Arc<dyn MergeOperator>,
    ) -> Self {
        MergedView { sources, tombstones, read_seq, merge_operator }
    }

    pub fn read_seq(&self) -> u64 {
        self.read_seq
    }

    /// A view over only the sources whose filters admit `raw`.
    pub fn restrict_to_prefix(&self, raw: &[u8]) -> MergedView {
        MergedView {
            sources: self
                .sources
                .iter()
                .filter(|s| s.may_contain_prefix(raw))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    pub fn seek(&self, target: &EncodedKey) -> Option<EncodedKey> {
        self.sources.iter().filter_map(|s| s.seek_user_key(target)).min()
    }

    pub fn next_after(&self, key: &EncodedKey) -> Option<EncodedKey> {
        self.sources.iter().filter_map(|s| s.next_user_key(key)).min()
    }

    pub fn prev_before(&self, key: &EncodedKey) -> Option<EncodedKey> {
        self.sources.iter().filter_map(|s| s.prev_user_key(key)).max()
    }

    pub fn last(&self) -> Option<EncodedKey> {
        self.sources.iter().filter_map(|s| s.last_user_key()).max()
    }

    fn covering_tombstone_seq(&self, key: &EncodedKey) -> u64 {
        self.tombstones
            .iter()
            .filter(|t| t.sequence <= self.read_seq && t.covers(key))
            .map(|t| t.sequence)
            .max()
            .unwrap_or(0)
    }

    pub fn resolve(&self, key: &EncodedKey) -> Result<Resolved> {
        let mut versions = Vec::new();
        for source in &self.sources {
            source.collect_versions(key, self.read_seq, &mut versions);
        }
        if versions.is_empty() {
            return Ok(Resolved::Absent);
        }
        versions.sort_by(|a, b| b.0.cmp(&a.0));

        let tombstone_seq = self.covering_tombstone_seq(key);
        let mut operands = Vec::new();
        let mut base = None;
        let mut deleted = false;
        for (seq, entry) in versions {
            if seq < tombstone_seq {
                deleted = true;
                break;
            }
            match entry.value_type {
                ValueType::Put => {
                    base = Some(entry.value);
                    break;
                }
                ValueType::Delete => {
                    deleted = true;
                    break;
                }
                ValueType::Merge => operands.push(entry.value),
            }
        }

        if operands.is_empty() {
            return Ok(match base {
                Some(v) => Resolved::Value(v),
                None if deleted => Resolved::Deleted,
                None => Resolved::Absent,
            });
        }
        operands.reverse();
        let merged = self
            .merge_operator
            .full_merge(key.as_bytes(), base.as_deref(), &operands)?;
        Ok(Resolved::Value(merged))
    }
}
