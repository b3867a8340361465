//! Picking a size-balanced split key for a range.

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::keys::NoSplitSpans;
use crate::mvcc::key::{MVCC_VERSION_TIMESTAMP_SIZE, MvccKey};

/// Whether a range may be split at raw key `key`.
pub fn is_valid_split_key(key: &[u8], spans: &NoSplitSpans) -> bool {
    !key.is_empty() && !spans.splits(key)
}

/// Scans forward from raw key `start` and returns the raw key closest to
/// `target_size` bytes into the scan that is a valid split point, is not the
/// first row and sorts at or after `min_split`.
///
/// The scan stops as soon as the distance to the target starts growing
/// again. Sizes are charged like MVCC stats: a metadata row costs its raw
/// key plus one byte plus its value, each version its value plus a
/// 12-byte timestamp.
pub fn find_split_key<I: StorageIterator>(
    iter: &mut I,
    start: &[u8],
    min_split: &[u8],
    target_size: i64,
    spans: &NoSplitSpans,
) -> Result<Option<Vec<u8>>> {
    iter.seek(MvccKey::meta(start).encode().as_bytes())?;

    let mut best: Option<Vec<u8>> = None;
    let mut best_diff = i64::MAX;
    let mut size_so_far = 0i64;
    let mut prev_raw: Option<Vec<u8>> = None;
    let mut rows = 0usize;

    while iter.is_valid() {
        rows += 1;
        let decoded = MvccKey::decode(iter.key())?;
        let raw = decoded.key.as_slice();

        let valid = rows > 1 && is_valid_split_key(raw, spans) && raw >= min_split;
        let diff = (target_size - size_so_far).abs();
        if valid && diff < best_diff {
            best = Some(raw.to_vec());
            best_diff = diff;
        }
        if diff > best_diff && best.is_some() {
            break;
        }

        let value_len = iter.value().len() as i64;
        let same_key = prev_raw.as_deref() == Some(raw);
        if decoded.is_value() && same_key {
            size_so_far += value_len + MVCC_VERSION_TIMESTAMP_SIZE;
        } else {
            size_so_far += raw.len() as i64 + 1 + value_len;
            if decoded.is_value() {
                size_so_far += MVCC_VERSION_TIMESTAMP_SIZE;
            }
        }
        prev_raw = Some(decoded.key);
        iter.next()?;
    }

    Ok(best)
}
