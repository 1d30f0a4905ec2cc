use crate::error::{Error, Result};

/// Magic number to identify table files.
pub const SSTABLE_MAGIC: u64 = 0x4C534D5F53535401; // "LSM_SST\x01"

/// Size of the CRC32 trailer that follows every block.
pub const BLOCK_TRAILER_SIZE: usize = 4;

/// Location of a block inside the table file. `size` excludes the CRC trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    pub const ENCODED_SIZE: usize = 16;

    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::ENCODED_SIZE {
            return Err(Error::Corruption("block handle truncated".into()));
        }
        Ok(BlockHandle {
            offset: read_u64(data, 0),
            size: read_u64(data, 8),
        })
    }

    /// First byte after this block and its trailer. Handles read back from
    /// a damaged file can point past `u64::MAX`; that is corruption.
    pub fn end(&self) -> Result<u64> {
        self.offset
            .checked_add(self.size)
            .and_then(|end| end.checked_add(BLOCK_TRAILER_SIZE as u64))
            .ok_or_else(|| Error::Corruption(format!("block handle {self:?} overflows")))
    }
}

/// An entry in the table's index block.
/// Maps a data block's last key to its location in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Last (largest) internal key in the block.
    pub last_key: Vec<u8>,
    pub handle: BlockHandle,
}

impl IndexEntry {
    /// Encode this index entry to bytes.
    /// Format: [key_len(4B)][key][offset(8B)][size(8B)]
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.last_key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.last_key);
        self.handle.encode_to(buf);
    }

    /// Decode an index entry from bytes, returning (entry, bytes_consumed).
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 4 {
            return Err(Error::Corruption("index entry too short".into()));
        }
        let key_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let total = 4 + key_len + BlockHandle::ENCODED_SIZE;
        if data.len() < total {
            return Err(Error::Corruption("index entry truncated".into()));
        }
        let last_key = data[4..4 + key_len].to_vec();
        let handle = BlockHandle::decode(&data[4 + key_len..total])?;
        Ok((IndexEntry { last_key, handle }, total))
    }
}

/// The footer sits at the end of the table file.
/// It tells the reader where to find the index and filter blocks.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ Index block offset (8B)              │
/// │ Index block size (8B)                │
/// │ Filter block offset (8B)             │
/// │ Filter block size (8B)               │
/// │ Entry count (8B)                     │
/// │ Magic number (8B)                    │
/// └──────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub index: BlockHandle,
    pub filter: BlockHandle,
    pub entry_count: u64,
}

impl Footer {
    /// Size of the footer in bytes (fixed).
    pub const SIZE: usize = 8 * 6;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.index.encode_to(&mut buf);
        self.filter.encode_to(&mut buf);
        buf.extend_from_slice(&self.entry_count.to_le_bytes());
        buf.extend_from_slice(&SSTABLE_MAGIC.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Corruption("footer too short".into()));
        }
        let magic = read_u64(data, 40);
        if magic != SSTABLE_MAGIC {
            return Err(Error::Corruption(format!(
                "bad magic: expected {SSTABLE_MAGIC:#x}, got {magic:#x}"
            )));
        }
        Ok(Footer {
            index: BlockHandle::decode(&data[0..16])?,
            filter: BlockHandle::decode(&data[16..32])?,
            entry_count: read_u64(data, 32),
        })
    }
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}
