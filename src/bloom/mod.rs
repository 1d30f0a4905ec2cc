pub mod builder;

use xxhash_rust::xxh3::xxh3_128;

use crate::error::{Error, Result};

/// Per-table set membership over user keys: "definitely absent" or
/// "possibly present".
///
/// Point lookups consult it before touching any data block. Sized as
/// `bits_per_key = -1.44 * log2(fpr)` with `bits_per_key * ln 2` probes;
/// the probes come from one 128-bit xxh3 hash split into halves `h1, h2`,
/// probe `i` landing on bit `(h1 + i * h2) mod num_bits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_hashes: u32,
    num_bits: u32,
}

/// `[num_hashes(4B)][num_bits(4B)]` ahead of the bit array.
const HEADER_SIZE: usize = 8;

/// Rates outside this range are clamped.
const MIN_FALSE_POSITIVE_RATE: f64 = 1e-9;
const MAX_FALSE_POSITIVE_RATE: f64 = 0.5;

impl BloomFilter {
    /// Empty filter sized for `expected_items` keys (at least one) at the
    /// given false positive rate.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let rate = if false_positive_rate.is_nan() {
            MAX_FALSE_POSITIVE_RATE
        } else {
            false_positive_rate.clamp(MIN_FALSE_POSITIVE_RATE, MAX_FALSE_POSITIVE_RATE)
        };
        let bits_per_key = -1.44 * rate.log2();

        let wanted = (expected_items.max(1) as f64 * bits_per_key).ceil();
        let num_bits = (wanted.min(u32::MAX as f64) as u32).max(64);
        let num_hashes = ((bits_per_key * std::f64::consts::LN_2).ceil() as u32).clamp(1, 30);

        BloomFilter {
            bits: vec![0; (num_bits as usize).div_ceil(64)],
            num_hashes,
            num_bits,
        }
    }

    pub fn insert(&mut self, key: &[u8]) {
        self.insert_hash(hash_key(key));
    }

    pub(crate) fn insert_hash(&mut self, hash: (u64, u64)) {
        for bit in self.probes(hash) {
            self.bits[bit / 64] |= 1 << (bit % 64);
        }
    }

    /// False means the key was never inserted.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        self.probes(hash_key(key))
            .all(|bit| self.bits[bit / 64] & (1 << (bit % 64)) != 0)
    }

    /// Serialize the filter: `[num_hashes(4B)][num_bits(4B)][bits(8B each)]`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.bits.len() * 8);
        buf.extend_from_slice(&self.num_hashes.to_le_bytes());
        buf.extend_from_slice(&self.num_bits.to_le_bytes());
        for word in &self.bits {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Deserialize a filter written by [`BloomFilter::serialize`].
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Corruption("bloom filter too short".into()));
        }
        let num_hashes = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let num_bits = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let words = &data[HEADER_SIZE..];

        let expected_words = (num_bits as usize).div_ceil(64);
        if num_hashes == 0 || num_bits == 0 || words.len() != expected_words * 8 {
            return Err(Error::Corruption(format!(
                "bloom filter header mismatch: {num_hashes} hashes, {num_bits} bits, {} bytes",
                words.len()
            )));
        }

        let bits = words
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();

        Ok(Self {
            bits,
            num_hashes,
            num_bits,
        })
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Bit positions probed for a key hash.
    fn probes(&self, (h1, h2): (u64, u64)) -> impl Iterator<Item = usize> + use<> {
        let num_bits = u64::from(self.num_bits);
        (0..u64::from(self.num_hashes))
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % num_bits) as usize)
    }
}

/// Split a 128-bit xxh3 hash into the two halves used for double hashing.
pub(crate) fn hash_key(key: &[u8]) -> (u64, u64) {
    let hash128 = xxh3_128(key);
    (hash128 as u64, (hash128 >> 64) as u64)
}
