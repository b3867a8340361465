//! MVCC key codec.
//!
//! An MVCC key is a raw key plus a hybrid-logical timestamp. On disk it is
//! laid out as:
//!
//! ```text
//! ┌───────────┬──────────────┬──────────────────┬────────────────────┬───────────────┐
//! │ raw (var) │ 0x00 sep (1B)│ wall ^ 1<<63 (8B)│ logical ^ 1<<31 (4B)│ suffix_len(1B)│
//! └───────────┴──────────────┴──────────────────┴────────────────────┴───────────────┘
//! ```
//!
//! The logical field is omitted when zero, and the whole suffix (separator
//! included) is omitted for the zero timestamp, so `suffix_len` is one of
//! 0, 9 or 13. Multi-byte fields are big-endian with the sign bit flipped,
//! so equal-length suffixes compare in signed numeric order.
//!
//! Encoded keys are ordered by [`compare`]: raw key ascending, then the
//! zero-timestamp metadata key, then versions newest first.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::Key;

/// Size accounted for the timestamp of every MVCC version in stats.
pub const MVCC_VERSION_TIMESTAMP_SIZE: i64 = 12;

const WALL_SIZE: usize = 8;
const LOGICAL_SIZE: usize = 4;
const SUFFIX_WALL_ONLY: usize = 1 + WALL_SIZE;
const SUFFIX_WITH_LOGICAL: usize = 1 + WALL_SIZE + LOGICAL_SIZE;

/// A hybrid-logical timestamp: wall-clock nanoseconds plus a logical counter.
///
/// `Ord` is chronological (older < newer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    pub wall_time: i64,
    pub logical: i32,
}

impl Timestamp {
    /// The "no timestamp" sentinel carried by metadata keys.
    pub const ZERO: Timestamp = Timestamp { wall_time: 0, logical: 0 };

    pub fn new(wall_time: i64, logical: i32) -> Self {
        Timestamp { wall_time, logical }
    }

    pub fn is_empty(&self) -> bool {
        self.wall_time == 0 && self.logical == 0
    }
}

/// A versioned key: raw key bytes plus the timestamp of the version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MvccKey {
    pub key: Key,
    pub timestamp: Timestamp,
}

impl MvccKey {
    pub fn new(key: impl Into<Key>, timestamp: Timestamp) -> Self {
        MvccKey { key: key.into(), timestamp }
    }

    /// The metadata key for `key` (zero timestamp).
    pub fn meta(key: impl Into<Key>) -> Self {
        MvccKey { key: key.into(), timestamp: Timestamp::ZERO }
    }

    /// Whether this key addresses a version (as opposed to metadata).
    pub fn is_value(&self) -> bool {
        !self.timestamp.is_empty()
    }

    /// Length of the encoded form.
    pub fn encoded_len(&self) -> usize {
        self.key.len() + suffix_len(&self.timestamp) + 1
    }

    pub fn encode(&self) -> EncodedKey {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.key);
        let ts = &self.timestamp;
        if !ts.is_empty() {
            buf.push(0);
            buf.extend_from_slice(&((ts.wall_time as u64) ^ (1 << 63)).to_be_bytes());
            if ts.logical != 0 {
                buf.extend_from_slice(&((ts.logical as u32) ^ (1 << 31)).to_be_bytes());
            }
        }
        buf.push((buf.len() - self.key.len()) as u8);
        EncodedKey(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<MvccKey> {
        let (raw, ts) = split_key(buf)
            .ok_or_else(|| Error::MalformedKey(format!("bad suffix length in {buf:?}")))?;
        let timestamp = decode_timestamp(ts)
            .ok_or_else(|| Error::MalformedKey(format!("bad timestamp in {buf:?}")))?;
        Ok(MvccKey { key: raw.to_vec(), timestamp })
    }
}

impl Ord for MvccKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| compare_timestamps(&self.timestamp, &other.timestamp))
    }
}

impl PartialOrd for MvccKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn suffix_len(ts: &Timestamp) -> usize {
    if ts.is_empty() {
        0
    } else if ts.logical == 0 {
        SUFFIX_WALL_ONLY
    } else {
        SUFFIX_WITH_LOGICAL
    }
}

/// Zero timestamp first, then newest first.
fn compare_timestamps(a: &Timestamp, b: &Timestamp) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => b.cmp(a),
    }
}

/// Splits an encoded key into its raw key and timestamp bytes (separator
/// and length byte stripped). Returns None if the suffix length is
/// inconsistent with the buffer.
pub fn split_key(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&len, rest) = buf.split_last()?;
    let len = len as usize;
    if len > rest.len() {
        return None;
    }
    let (raw, suffix) = rest.split_at(rest.len() - len);
    match suffix.split_first() {
        None => Some((raw, suffix)),
        Some((&0, ts)) => Some((raw, ts)),
        Some(_) => None,
    }
}

/// Decodes the timestamp bytes returned by [`split_key`].
pub fn decode_timestamp(ts: &[u8]) -> Option<Timestamp> {
    match ts.len() {
        0 => Some(Timestamp::ZERO),
        WALL_SIZE | 12 => {
            let wall = u64::from_be_bytes(ts[..WALL_SIZE].try_into().ok()?) ^ (1 << 63);
            let logical = if ts.len() == WALL_SIZE {
                0
            } else {
                let logical = u32::from_be_bytes(ts[WALL_SIZE..].try_into().ok()?) ^ (1 << 31);
                // the encoder never writes a zero logical
                if logical == 0 {
                    return None;
                }
                logical as i32
            };
            let ts = Timestamp::new(wall as i64, logical);
            // a zero timestamp is always written without a suffix
            if ts.is_empty() { None } else { Some(ts) }
        }
        _ => None,
    }
}

/// The raw-key prefix of an encoded key, or the whole buffer if it does
/// not split.
pub fn raw_key(buf: &[u8]) -> &[u8] {
    split_key(buf).map(|(raw, _)| raw).unwrap_or(buf)
}

/// The engine comparator over encoded keys.
///
/// Keys that fail to split compare bytewise. Keys that decode to the same
/// (raw, timestamp) pair fall back to bytewise comparison so the order is
/// consistent with byte equality.
pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
    let (Some((raw_a, ts_a)), Some((raw_b, ts_b))) = (split_key(a), split_key(b)) else {
        return a.cmp(b);
    };
    let ord = raw_a.cmp(raw_b);
    if ord != Ordering::Equal {
        return ord;
    }
    match (decode_timestamp(ts_a), decode_timestamp(ts_b)) {
        (Some(x), Some(y)) => compare_timestamps(&x, &y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// An encoded MVCC key, ordered by [`compare`].
///
/// The empty key is used by ranges to mean "unbounded" and sorts before
/// every other key.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct EncodedKey(Vec<u8>);

impl EncodedKey {
    /// Wraps bytes without validating them.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        EncodedKey(bytes)
    }

    pub fn empty() -> Self {
        EncodedKey(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn decode(&self) -> Result<MvccKey> {
        MvccKey::decode(&self.0)
    }

    pub fn raw_key(&self) -> &[u8] {
        raw_key(&self.0)
    }
}

impl Ord for EncodedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

impl PartialOrd for EncodedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AsRef<[u8]> for EncodedKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&MvccKey> for EncodedKey {
    fn from(key: &MvccKey) -> Self {
        key.encode()
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(k) if k.is_value() => write!(
                f,
                "{:?}@{}.{}",
                String::from_utf8_lossy(&k.key),
                k.timestamp.wall_time,
                k.timestamp.logical
            ),
            Ok(k) => write!(f, "{:?}", String::from_utf8_lossy(&k.key)),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}
