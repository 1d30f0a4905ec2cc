use std::cmp::Ordering;

use crate::comparator::InternalKeyComparator;
use crate::error::{Error, Result};
use crate::sstable::block::builder::ENTRY_HEADER_SIZE;

/// A decoded, immutable data block.
///
/// Decoding validates the offset array once; entry access afterwards only
/// slices into the owned buffer.
#[derive(Debug, Clone)]
pub struct Block {
    data: Vec<u8>,
    offsets: Vec<u32>,
}

impl Block {
    /// Parse a block produced by [`BlockBuilder::build`](super::builder::BlockBuilder::build).
    pub fn decode(data: Vec<u8>) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::Corruption("block too short".into()));
        }
        let count_at = data.len() - 4;
        let count = read_u32(&data, count_at) as usize;
        let offsets_len = count
            .checked_mul(4)
            .filter(|len| *len <= count_at)
            .ok_or_else(|| Error::Corruption(format!("block entry count {count} too large")))?;
        let entries_end = count_at - offsets_len;

        let mut offsets = Vec::with_capacity(count);
        let mut expected = 0usize;
        for i in 0..count {
            let offset = read_u32(&data, entries_end + i * 4);
            if offset as usize != expected {
                return Err(Error::Corruption(format!(
                    "block offset {i} is {offset}, expected {expected}"
                )));
            }
            let (key_len, val_len) = entry_lengths(&data, offset as usize, entries_end)?;
            expected = offset as usize + ENTRY_HEADER_SIZE + key_len + val_len;
            offsets.push(offset);
        }
        if expected != entries_end {
            return Err(Error::Corruption(format!(
                "block entries end at {expected}, offsets start at {entries_end}"
            )));
        }

        Ok(Block { data, offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Key and value of entry `index`.
    pub fn entry(&self, index: usize) -> (&[u8], &[u8]) {
        let start = self.offsets[index] as usize;
        let key_len = read_u32(&self.data, start) as usize;
        let val_len = read_u32(&self.data, start + 4) as usize;
        let key_start = start + ENTRY_HEADER_SIZE;
        let val_start = key_start + key_len;
        (
            &self.data[key_start..val_start],
            &self.data[val_start..val_start + val_len],
        )
    }

    /// Index of the first entry with key >= target, or `len()` if none.
    pub fn seek(&self, target: &[u8], cmp: &InternalKeyComparator) -> usize {
        let (mut lo, mut hi) = (0usize, self.offsets.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(self.entry(mid).0, target) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn entry_lengths(data: &[u8], offset: usize, limit: usize) -> Result<(usize, usize)> {
    if offset + ENTRY_HEADER_SIZE > limit {
        return Err(Error::Corruption(format!("entry header at {offset} truncated")));
    }
    let key_len = read_u32(data, offset) as usize;
    let val_len = read_u32(data, offset + 4) as usize;
    let end = (offset + ENTRY_HEADER_SIZE)
        .checked_add(key_len)
        .and_then(|n| n.checked_add(val_len));
    match end {
        Some(end) if end <= limit => Ok((key_len, val_len)),
        _ => Err(Error::Corruption(format!("entry at {offset} overruns block"))),
    }
}
