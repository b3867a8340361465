use crate::bloom::BloomFilter;

/// Collects the distinct raw-key prefixes of a segment while it is built,
/// then sizes the filter for the exact count.
///
/// Entries arrive sorted, so all versions of one raw key are adjacent and
/// a single comparison against the last prefix deduplicates them.
pub struct BloomFilterBuilder {
    prefixes: Vec<Vec<u8>>,
    false_positive_rate: f64,
}

impl BloomFilterBuilder {
    pub fn new(false_positive_rate: f64) -> Self {
        BloomFilterBuilder { prefixes: Vec::new(), false_positive_rate }
    }

    pub fn add_prefix(&mut self, prefix: &[u8]) {
        if self.prefixes.last().map(Vec::as_slice) != Some(prefix) {
            self.prefixes.push(prefix.to_vec());
        }
    }

    pub fn build(self) -> BloomFilter {
        let mut filter = BloomFilter::new(self.prefixes.len(), self.false_positive_rate);
        for prefix in &self.prefixes {
            filter.insert(prefix);
        }
        filter
    }
}
