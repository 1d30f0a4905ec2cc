/// Encodes a run of sorted records into one data (or index) block.
///
/// ```text
/// [key_len u32][val_len u32][key][value]   × count
/// [entry offset u32]                       × count
/// [count u32]
/// ```
///
/// The trailing offsets give random access for binary search. The table
/// writer appends a CRC32 of the encoded block; that trailer is not part
/// of the block.
pub struct BlockBuilder {
    buf: Vec<u8>,
    offsets: Vec<u32>,
    target_size: usize,
}

/// Per-entry header: key_len + val_len.
pub const ENTRY_HEADER_SIZE: usize = 8;

/// Bytes an entry adds to the encoded block, its offset slot included.
fn encoded_len(key: &[u8], value: &[u8]) -> usize {
    ENTRY_HEADER_SIZE + key.len() + value.len() + 4
}

impl BlockBuilder {
    pub fn new(target_size: usize) -> Self {
        BlockBuilder {
            buf: Vec::with_capacity(target_size),
            offsets: Vec::new(),
            target_size,
        }
    }

    /// Append a record unless it would push the block past its target size.
    /// An empty block takes any record, so oversized records still get a
    /// block of their own.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> bool {
        let grown = self.estimated_size() + encoded_len(key, value);
        if !self.is_empty() && grown > self.target_size {
            return false;
        }

        self.offsets.push(self.buf.len() as u32);
        for len in [key.len(), value.len()] {
            self.buf.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.buf.extend_from_slice(key);
        self.buf.extend_from_slice(value);
        true
    }

    /// Encoded block, offsets and count appended.
    pub fn build(self) -> Vec<u8> {
        let BlockBuilder {
            mut buf, offsets, ..
        } = self;
        buf.reserve(offsets.len() * 4 + 4);
        offsets
            .iter()
            .for_each(|off| buf.extend_from_slice(&off.to_le_bytes()));
        buf.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
        buf
    }

    /// Size `build` would return right now.
    pub fn estimated_size(&self) -> usize {
        self.buf.len() + (self.offsets.len() + 1) * 4
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_record_always_fits() {
        let mut block = BlockBuilder::new(16);
        assert!(block.add(&[b'k'; 40], b"v"));
        assert!(!block.add(b"k2", b"v"));
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn estimated_size_matches_build() {
        let mut block = BlockBuilder::new(4096);
        assert_eq!(block.estimated_size(), 4);
        block.add(b"apple", b"red");
        block.add(b"banana", b"yellow");
        let estimate = block.estimated_size();
        let bytes = block.build();
        assert_eq!(bytes.len(), estimate);
        assert_eq!(&bytes[bytes.len() - 4..], &2u32.to_le_bytes());
    }
}
