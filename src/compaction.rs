//! Partitioning of segment metadata into compaction ranges.

use tracing::trace;

use crate::error::{Error, Result};
use crate::keys::NoSplitSpans;
use crate::mvcc::key::{EncodedKey, MvccKey};
use crate::segment::FileSegmentMeta;

/// A half-open `[start, end)` range of encoded keys. Empty bounds are the
/// keyspace start and end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionRange {
    pub start: EncodedKey,
    pub end: EncodedKey,
}

impl CompactionRange {
    pub fn new(start: EncodedKey, end: EncodedKey) -> Self {
        CompactionRange { start, end }
    }
}

/// Groups `segments` (sorted by smallest key) overlapping `[start, end)`
/// into contiguous ranges of at least `target_size` bytes each.
///
/// The first range starts at `start` and the last ends at `end`. A range
/// closes at the running maximum largest key, clamped to `[start, end]`,
/// once its segments add up to the target. A boundary strictly inside a
/// no-split span moves to the span's end; a boundary that would yield an
/// empty range is deferred. Segments lying wholly below the current range
/// start were covered by an earlier range and are not counted again.
pub fn batch_for_compaction(
    segments: &[FileSegmentMeta],
    start: &EncodedKey,
    end: &EncodedKey,
    target_size: u64,
    spans: &NoSplitSpans,
) -> Result<Vec<CompactionRange>> {
    for (index, pair) in segments.windows(2).enumerate() {
        if pair[1].smallest_key < pair[0].smallest_key {
            return Err(Error::UnsortedInput { index: index + 1 });
        }
    }

    let overlapping: Vec<&FileSegmentMeta> = segments
        .iter()
        .filter(|s| start.is_empty() || s.largest_key >= *start)
        .filter(|s| end.is_empty() || s.smallest_key < *end)
        .collect();

    let mut ranges = Vec::new();
    let mut range_start = start.clone();
    let mut size = 0u64;
    let mut boundary: Option<&EncodedKey> = None;

    for (i, segment) in overlapping.iter().enumerate() {
        let covered = segment.largest_key < range_start;
        if !covered {
            size = size.saturating_add(segment.size_bytes);
            if boundary.is_none_or(|b| segment.largest_key > *b) {
                boundary = Some(&segment.largest_key);
            }
        }

        if i + 1 == overlapping.len() {
            ranges.push(CompactionRange::new(range_start, end.clone()));
            break;
        }
        if covered || size < target_size {
            continue;
        }

        let Some(largest) = boundary else { continue };
        let mut close = clamp(largest, start, end);
        if let Some(span_end) = enclosing_span_end(spans, &close) {
            trace!(boundary = ?close, ?span_end, "compaction boundary inside no-split span, moving to span end");
            close = clamp(&span_end, start, end);
        }
        if !end.is_empty() && close >= *end {
            ranges.push(CompactionRange::new(range_start, end.clone()));
            break;
        }
        if close <= range_start {
            continue;
        }

        ranges.push(CompactionRange::new(range_start, close.clone()));
        range_start = close;
        size = 0;
    }

    Ok(ranges)
}

/// End of the no-split span holding `key` strictly inside it, as a metadata
/// key. Versions of a span's start key sort after its metadata row, so they
/// count as inside.
fn enclosing_span_end(spans: &NoSplitSpans, key: &EncodedKey) -> Option<EncodedKey> {
    spans.spans().iter().find_map(|span| {
        let span_start = MvccKey::meta(span.start.as_slice()).encode();
        let span_end = MvccKey::meta(span.end.as_slice()).encode();
        (*key > span_start && *key < span_end).then_some(span_end)
    })
}

fn clamp(key: &EncodedKey, start: &EncodedKey, end: &EncodedKey) -> EncodedKey {
    if !start.is_empty() && key < start {
        start.clone()
    } else if !end.is_empty() && key > end {
        end.clone()
    } else {
        key.clone()
    }
}
