pub mod builder;

use xxhash_rust::xxh3::xxh3_128;

/// Probabilistic set of raw-key prefixes attached to each segment.
///
/// - If any bit is 0 → no key with that prefix is in the segment
/// - If all bits are 1 → the segment probably holds some version of it
///
/// Every version of an MVCC key shares its raw key, so one filter entry
/// covers the metadata key and all versions. Point reads and prefix
/// iteration consult it to skip segments.
///
/// Sizing:
///   bits_per_key = -1.44 * log2(false_positive_rate)
///   num_hashes = bits_per_key * ln(2)
///
/// Double hashing: h_i(key) = h1(key) + i * h2(key) (mod m), with h1 and
/// h2 the two halves of a 128-bit xxh3 hash.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_hashes: u32,
    num_bits: u32,
}

impl BloomFilter {
    /// Create a filter sized for `expected_items` at the given FPR.
    ///
    /// A zero item count is sized as one item; the FPR is clamped into (0, 1).
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let expected_items = expected_items.max(1);
        let fpr = false_positive_rate.clamp(1e-9, 0.5);

        let bits_per_key = -1.44 * fpr.log2();
        let num_bits = (((expected_items as f64) * bits_per_key).ceil() as u32).max(64);
        let num_hashes = ((bits_per_key * 2.0f64.ln()).ceil() as u32).max(1);

        BloomFilter {
            bits: vec![0u64; (num_bits as usize).div_ceil(64)],
            num_hashes,
            num_bits,
        }
    }

    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = Self::hash_key(key);
        for i in 0..self.num_hashes {
            let pos = self.position(h1, h2, i);
            self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
        }
    }

    /// false → definitely absent. true → probably present.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = Self::hash_key(key);
        (0..self.num_hashes).all(|i| {
            let pos = self.position(h1, h2, i);
            (self.bits[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
        })
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    fn hash_key(key: &[u8]) -> (u64, u64) {
        let hash128 = xxh3_128(key);
        (hash128 as u64, (hash128 >> 64) as u64)
    }

    fn position(&self, h1: u64, h2: u64, i: u32) -> u32 {
        (h1.wrapping_add((i as u64).wrapping_mul(h2)) % (self.num_bits as u64)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_prefixes_are_found() {
        let mut bf = BloomFilter::new(100, 0.01);
        bf.insert(b"hello");
        assert!(bf.may_contain(b"hello"));
        assert!(!bf.may_contain(b"world"));
    }

    #[test]
    fn sizing_floor() {
        let bf = BloomFilter::new(0, 0.01);
        assert!(bf.num_bits() >= 64);
        assert!(bf.num_hashes() >= 1);
    }
}
