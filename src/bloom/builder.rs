use crate::bloom::{hash_key, BloomFilter};

/// Collects key hashes while a table is written and sizes the filter at the end.
///
/// The number of distinct keys a build emits is unknown until the stream
/// ends (elision may drop most of them), so only 16 bytes of hash are kept
/// per key and the bit array is allocated once, in [`build`](Self::build).
pub struct BloomFilterBuilder {
    hashes: Vec<(u64, u64)>,
    false_positive_rate: f64,
}

impl BloomFilterBuilder {
    pub fn new(false_positive_rate: f64) -> Self {
        BloomFilterBuilder {
            hashes: Vec::new(),
            false_positive_rate,
        }
    }

    /// Add a key. Consecutive duplicates (versions of one user key) are
    /// recorded once.
    pub fn add_key(&mut self, key: &[u8]) {
        let hash = hash_key(key);
        if self.hashes.last() != Some(&hash) {
            self.hashes.push(hash);
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Size a filter for the keys seen so far and fill it.
    pub fn build(&self) -> BloomFilter {
        let mut filter = BloomFilter::new(self.hashes.len().max(1), self.false_positive_rate);
        for hash in &self.hashes {
            filter.insert_hash(*hash);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_versions_count_once() {
        let mut builder = BloomFilterBuilder::new(0.01);
        builder.add_key(b"a");
        builder.add_key(b"a");
        builder.add_key(b"b");
        assert_eq!(builder.len(), 2);

        let filter = builder.build();
        assert!(filter.may_contain(b"a"));
        assert!(filter.may_contain(b"b"));
    }

    #[test]
    fn empty_builder_still_builds() {
        let builder = BloomFilterBuilder::new(0.01);
        assert!(builder.is_empty());
        let filter = builder.build();
        assert!(!filter.may_contain(b"anything"));
    }
}
