use crate::bloom::builder::BloomFilterBuilder;
use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::types::{Entry, InternalKey};

/// Builds a segment from a sorted stream of internal entries.
///
/// Used during:
/// - Memtable flush (sorted memtable → segment)
/// - Compaction (merged segments → new segment)
pub struct SegmentBuilder {
    id: u64,
    entries: Vec<(InternalKey, Entry)>,
    filter: BloomFilterBuilder,
    size_bytes: u64,
}

impl SegmentBuilder {
    pub fn new(id: u64, false_positive_rate: f64) -> Self {
        SegmentBuilder {
            id,
            entries: Vec::new(),
            filter: BloomFilterBuilder::new(false_positive_rate),
            size_bytes: 0,
        }
    }

    /// Add an entry. MUST be called in strictly increasing internal key order.
    pub fn add(&mut self, key: InternalKey, entry: Entry) -> Result<()> {
        if let Some((last, _)) = self.entries.last() {
            if *last >= key {
                return Err(Error::Corruption(format!(
                    "segment keys out of order: {:?}#{} >= {:?}#{}",
                    last.user_key, last.sequence, key.user_key, key.sequence
                )));
            }
        }
        self.filter.add_prefix(key.user_key.raw_key());
        // key + sequence + type + value
        self.size_bytes += (key.user_key.len() + 8 + 1 + entry.value.len()) as u64;
        self.entries.push((key, entry));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Segment {
        Segment {
            id: self.id,
            entries: self.entries,
            filter: self.filter.build(),
            size_bytes: self.size_bytes,
        }
    }
}
