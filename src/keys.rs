//! Reserved key prefixes and the spans that must never be split.
//!
//! The keyspace is partitioned by leading bytes:
//!
//! ```text
//! 0x01 ..        local keys (0x01 'i' .. = range-local replicated state)
//! 0x02 ..        meta1 range descriptors
//! 0x03 ..        meta2 range descriptors
//! 0x04 ..        system keys (node liveness, ...)
//! 0x05 ..        user / table data
//! ```

/// End of the local keyspace; raw keys below it are accounted as system data.
pub const LOCAL_MAX: &[u8] = b"\x02";
pub const LOCAL_PREFIX: &[u8] = b"\x01";
pub const LOCAL_RANGE_ID_PREFIX: &[u8] = b"\x01\x69";
pub const META1_PREFIX: &[u8] = b"\x02";
pub const META2_PREFIX: &[u8] = b"\x03";
pub const META2_KEY_MAX: &[u8] = b"\x03\xff\xff";
pub const META_MAX: &[u8] = b"\x04";
pub const SYSTEM_PREFIX: &[u8] = META_MAX;
pub const SYSTEM_MAX: &[u8] = b"\x05";
pub const MIN_KEY: &[u8] = b"";
pub const MAX_KEY: &[u8] = b"\xff\xff";

/// The region a raw key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRegion {
    LocalMetadata,
    RangeLocal,
    Meta1,
    Meta2,
    System,
    User,
}

impl KeyRegion {
    pub fn of(raw: &[u8]) -> KeyRegion {
        if raw < LOCAL_MAX {
            if raw.starts_with(LOCAL_RANGE_ID_PREFIX) {
                KeyRegion::RangeLocal
            } else {
                KeyRegion::LocalMetadata
            }
        } else if raw < META2_PREFIX {
            KeyRegion::Meta1
        } else if raw < META_MAX {
            KeyRegion::Meta2
        } else if raw < SYSTEM_MAX {
            KeyRegion::System
        } else {
            KeyRegion::User
        }
    }

    /// Local keys are accounted as system bytes by the stats scan.
    pub fn is_local(self) -> bool {
        matches!(self, KeyRegion::LocalMetadata | KeyRegion::RangeLocal)
    }
}

/// A `[start, end)` span of raw keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpan {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeySpan {
    pub fn new(start: &[u8], end: &[u8]) -> Self {
        KeySpan { start: start.to_vec(), end: end.to_vec() }
    }

    /// True if `start < key < end`. A split exactly at `start` keeps the
    /// span whole, so it does not count as inside.
    pub fn strictly_contains(&self, key: &[u8]) -> bool {
        key > self.start.as_slice() && key < self.end.as_slice()
    }
}

/// Spans of raw keys that range-partitioning must keep together.
///
/// Built once and passed by reference; the table is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoSplitSpans {
    spans: Vec<KeySpan>,
}

impl NoSplitSpans {
    /// Builds a table from arbitrary spans, sorting them by descending start.
    pub fn new(mut spans: Vec<KeySpan>) -> Self {
        spans.sort_by(|a, b| b.start.cmp(&a.start));
        NoSplitSpans { spans }
    }

    pub fn none() -> Self {
        NoSplitSpans { spans: Vec::new() }
    }

    pub fn spans(&self) -> &[KeySpan] {
        &self.spans
    }

    /// The span that strictly contains `key`, if any.
    pub fn containing(&self, key: &[u8]) -> Option<&KeySpan> {
        // Descending starts: the first span starting below the key is the
        // only candidate, since spans don't overlap.
        for span in &self.spans {
            if key >= span.end.as_slice() {
                return None;
            }
            if key > span.start.as_slice() {
                return Some(span);
            }
        }
        None
    }

    pub fn splits(&self, key: &[u8]) -> bool {
        self.containing(key).is_some()
    }
}

impl Default for NoSplitSpans {
    fn default() -> Self {
        NoSplitSpans::new(vec![
            // system config tables
            KeySpan::new(b"\x88", b"\x93"),
            // node liveness
            KeySpan::new(b"\x04\x00liveness-", b"\x04\x00liveness."),
            // last meta2 key through the start of system keys
            KeySpan::new(META2_KEY_MAX, META_MAX),
            // local and meta1
            KeySpan::new(MIN_KEY, META2_PREFIX),
        ])
    }
}
