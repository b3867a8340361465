//! MVCC statistics over a key range.

use std::cmp::Ordering;

use crate::engine::iter::EngineIterator;
use crate::engine::perf::with_perf_scope;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::keys::KeyRegion;
use crate::mvcc::key::{MVCC_VERSION_TIMESTAMP_SIZE, MvccKey, compare, split_key};
use crate::mvcc::meta::MvccMetadata;

/// Aggregate sizes and counts over a set of MVCC keys.
///
/// Byte fields count encoded key and value sizes the way they are charged
/// by the replicated state machine: every version carries a 12-byte
/// timestamp and every metadata row the raw key plus one byte. Ages are in
/// seconds. Stats of disjoint raw-key ranges add up to the stats of their
/// union.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MvccStats {
    pub live_bytes: i64,
    pub live_count: i64,
    pub key_bytes: i64,
    pub key_count: i64,
    pub val_bytes: i64,
    pub val_count: i64,
    pub intent_bytes: i64,
    pub intent_count: i64,
    pub intent_age: i64,
    pub gc_bytes_age: i64,
    /// Bytes of versions shadowed by a newer version of the same key.
    pub garbage_bytes: i64,
    pub garbage_count: i64,
    pub sys_bytes: i64,
    pub sys_count: i64,
    pub last_update_nanos: i64,
}

impl MvccStats {
    /// Field-wise sum; `last_update_nanos` keeps the later of the two.
    pub fn add(&mut self, other: &MvccStats) {
        self.live_bytes += other.live_bytes;
        self.live_count += other.live_count;
        self.key_bytes += other.key_bytes;
        self.key_count += other.key_count;
        self.val_bytes += other.val_bytes;
        self.val_count += other.val_count;
        self.intent_bytes += other.intent_bytes;
        self.intent_count += other.intent_count;
        self.intent_age = self.intent_age.saturating_add(other.intent_age);
        self.gc_bytes_age = self.gc_bytes_age.saturating_add(other.gc_bytes_age);
        self.garbage_bytes += other.garbage_bytes;
        self.garbage_count += other.garbage_count;
        self.sys_bytes += other.sys_bytes;
        self.sys_count += other.sys_count;
        self.last_update_nanos = self.last_update_nanos.max(other.last_update_nanos);
    }
}

/// A range of MVCC keys. An empty raw key on `start` is the keyspace start,
/// on `end` the keyspace end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: MvccKey,
    pub end: MvccKey,
}

impl KeyRange {
    pub fn new(start: MvccKey, end: MvccKey) -> Self {
        KeyRange { start, end }
    }

    /// The whole keyspace.
    pub fn all() -> Self {
        KeyRange { start: MvccKey::default(), end: MvccKey::default() }
    }

    fn validate(&self) -> Result<()> {
        if !self.start.key.is_empty() && !self.end.key.is_empty() && self.start > self.end {
            return Err(Error::InvalidRange {
                start: self.start.encode().into_vec(),
                end: self.end.encode().into_vec(),
            });
        }
        Ok(())
    }
}

fn age_seconds(now_nanos: i64, wall_nanos: i64) -> i64 {
    now_nanos / 1_000_000_000 - wall_nanos / 1_000_000_000
}

/// `bytes * age` in byte-seconds, saturating at the i64 limits.
fn byte_age(bytes: i64, now_nanos: i64, since_nanos: i64) -> i64 {
    bytes.saturating_mul(age_seconds(now_nanos, since_nanos))
}

/// Computes stats for `range` over `iter`, inside a perf scope when the
/// iterator was opened `with_stats`.
pub fn compute_stats(iter: &mut EngineIterator, range: &KeyRange, now_nanos: i64) -> Result<MvccStats> {
    with_perf_scope(iter, |iter| compute_stats_internal(iter, range, now_nanos))
}

/// The stats scan over any storage iterator. The iterator must surface
/// MVCC tombstones.
pub fn compute_stats_internal<I: StorageIterator>(iter: &mut I, range: &KeyRange, now_nanos: i64) -> Result<MvccStats> {
    range.validate()?;

    let mut stats = MvccStats::default();
    let end = if range.end.key.is_empty() { None } else { Some(range.end.encode()) };
    if range.start.key.is_empty() {
        iter.seek_to_first()?;
    } else {
        iter.seek(range.start.encode().as_bytes())?;
    }

    let mut meta = MvccMetadata::default();
    let mut prev_raw: Vec<u8> = Vec::new();
    let mut have_prev = false;
    let mut first = false;
    let mut accrue_gc_age_nanos = 0i64;

    while iter.is_valid() {
        let key = iter.key();
        if let Some(end) = &end {
            if compare(key, end.as_bytes()) != Ordering::Less {
                break;
            }
        }
        let value = iter.value();
        let decoded = MvccKey::decode(key)?;
        let raw = split_key(key).map(|(raw, _)| raw).unwrap_or(key);

        let is_sys = KeyRegion::of(raw).is_local();
        let is_value = decoded.is_value();
        let implicit_meta = is_value && !(have_prev && prev_raw == raw);
        prev_raw.clear();
        prev_raw.extend_from_slice(raw);
        have_prev = true;

        let value_len = value.len() as i64;
        if implicit_meta {
            meta = MvccMetadata {
                txn: None,
                timestamp: decoded.timestamp,
                deleted: value.is_empty(),
                key_bytes: MVCC_VERSION_TIMESTAMP_SIZE,
                val_bytes: value_len,
                raw_bytes: None,
            };
        }

        if !is_value || implicit_meta {
            let meta_key_size = raw.len() as i64 + 1;
            let meta_val_size = if implicit_meta { 0 } else { value_len };
            let total = meta_key_size + meta_val_size;
            first = true;

            if !implicit_meta {
                meta = MvccMetadata::decode(value)?;
            }

            if is_sys {
                stats.sys_bytes += total;
                stats.sys_count += 1;
            } else {
                if !meta.deleted {
                    stats.live_bytes += total;
                    stats.live_count += 1;
                } else {
                    stats.gc_bytes_age = stats.gc_bytes_age.saturating_add(byte_age(total, now_nanos, meta.timestamp.wall_time));
                }
                stats.key_bytes += meta_key_size;
                stats.val_bytes += meta_val_size;
                stats.key_count += 1;
                if meta.is_inline() {
                    stats.val_count += 1;
                }
            }
            if !implicit_meta {
                iter.next()?;
                continue;
            }
        }

        let total = value_len + MVCC_VERSION_TIMESTAMP_SIZE;
        if is_sys {
            stats.sys_bytes += total;
        } else {
            if first {
                first = false;
                if !meta.deleted {
                    stats.live_bytes += total;
                } else {
                    stats.gc_bytes_age = stats.gc_bytes_age.saturating_add(byte_age(total, now_nanos, meta.timestamp.wall_time));
                }
                if meta.is_intent() {
                    stats.intent_bytes += total;
                    stats.intent_count += 1;
                    stats.intent_age = stats.intent_age.saturating_add(age_seconds(now_nanos, meta.timestamp.wall_time));
                }
                if meta.key_bytes != MVCC_VERSION_TIMESTAMP_SIZE {
                    return Err(Error::Corruption(format!(
                        "expected mvcc metadata key bytes to equal {}; got {}",
                        MVCC_VERSION_TIMESTAMP_SIZE, meta.key_bytes
                    )));
                }
                if meta.val_bytes != value_len {
                    return Err(Error::Corruption(format!(
                        "expected mvcc metadata val bytes to equal {}; got {}",
                        value_len, meta.val_bytes
                    )));
                }
                accrue_gc_age_nanos = meta.timestamp.wall_time;
            } else {
                stats.garbage_bytes += total;
                stats.garbage_count += 1;
                // a tombstone is garbage from its own timestamp, anything
                // else from when the next newer version shadowed it
                let since = if value.is_empty() { decoded.timestamp.wall_time } else { accrue_gc_age_nanos };
                stats.gc_bytes_age = stats.gc_bytes_age.saturating_add(byte_age(total, now_nanos, since));
                accrue_gc_age_nanos = decoded.timestamp.wall_time;
            }
            stats.key_bytes += MVCC_VERSION_TIMESTAMP_SIZE;
            stats.val_bytes += value_len;
            stats.val_count += 1;
        }

        iter.next()?;
    }

    stats.last_update_nanos = now_nanos;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_age_saturates() {
        assert_eq!(age_seconds(5_000_000_000, 2_000_000_000), 3);
        assert_eq!(byte_age(10, 5_000_000_000, 2_000_000_000), 30);

        let age = age_seconds(i64::MAX, i64::MIN);
        assert!(age > 0);
        assert_eq!(byte_age(i64::MAX / 2, i64::MAX, i64::MIN), i64::MAX);
        assert_eq!(byte_age(i64::MAX / 2, i64::MIN, i64::MAX), i64::MIN);

        let mut total = MvccStats { gc_bytes_age: i64::MAX - 1, ..Default::default() };
        total.add(&MvccStats { gc_bytes_age: 10, ..Default::default() });
        assert_eq!(total.gc_bytes_age, i64::MAX);
    }
}
