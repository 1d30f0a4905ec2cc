use std::cmp::Ordering;
use std::sync::Arc;

use crate::bloom::BloomFilter;
use crate::comparator::InternalKeyComparator;
use crate::env::RandomAccessFile;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::sstable::block::reader::Block;
use crate::sstable::footer::{BlockHandle, Footer, IndexEntry, BLOCK_TRAILER_SIZE};
use crate::types::{InternalKey, ParsedInternalKey, SequenceNumber, Value, ValueType};

/// Outcome of a point lookup that found some version of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found(Value),
    /// The newest visible version is a tombstone.
    Deleted,
}

/// An opened table file. Supports point lookups and full scans.
///
/// On open:
/// 1. Read footer (last 48 bytes) → find index and filter block positions
/// 2. Read, checksum and parse the index block → Vec<IndexEntry>
/// 3. Read, checksum and deserialize the bloom filter
/// 4. Ready for queries (data blocks read and checksummed on demand)
pub struct Table {
    file: Box<dyn RandomAccessFile>,
    comparator: InternalKeyComparator,
    /// Each entry maps a data block's last key to its file location.
    index: Vec<IndexEntry>,
    filter: BloomFilter,
    footer: Footer,
}

impl Table {
    /// Open a table whose size the caller already knows.
    ///
    /// A size mismatch is corruption: the file was truncated or extended
    /// after the writer reported its size.
    pub fn open(
        file: Box<dyn RandomAccessFile>,
        expected_size: u64,
        comparator: InternalKeyComparator,
    ) -> Result<Self> {
        let file_size = file.size();
        if file_size != expected_size {
            return Err(Error::Corruption(format!(
                "table is {file_size} bytes, expected {expected_size}"
            )));
        }
        if file_size < Footer::SIZE as u64 {
            return Err(Error::Corruption(
                "file too short to contain footer".into(),
            ));
        }

        let footer_offset = file_size - Footer::SIZE as u64;
        let footer = Footer::decode(&file.read_at(footer_offset, Footer::SIZE)?)?;
        if footer.filter.end()? > footer.index.offset || footer.index.end()? != footer_offset {
            return Err(Error::Corruption(format!(
                "footer handles out of place: filter {:?}, index {:?}, footer at {footer_offset}",
                footer.filter, footer.index
            )));
        }

        let index_buf = read_block(file.as_ref(), footer.index)?;
        let mut index = Vec::new();
        let mut offset = 0usize;
        while offset < index_buf.len() {
            let (entry, consumed) = IndexEntry::decode(&index_buf[offset..])?;
            if entry.handle.end()? > footer.filter.offset {
                return Err(Error::Corruption(format!(
                    "data block {:?} overlaps filter block",
                    entry.handle
                )));
            }
            index.push(entry);
            offset += consumed;
        }

        let filter = BloomFilter::deserialize(&read_block(file.as_ref(), footer.filter)?)?;

        Ok(Table {
            file,
            comparator,
            index,
            filter,
            footer,
        })
    }

    /// Entry count recorded in the footer.
    pub fn entry_count(&self) -> u64 {
        self.footer.entry_count
    }

    pub fn num_data_blocks(&self) -> usize {
        self.index.len()
    }

    /// Newest version of `user_key` with sequence <= `snapshot`.
    ///
    /// Algorithm:
    /// 1. Bloom filter says no → None
    /// 2. Binary search the index for the first block whose last key >= lookup key
    /// 3. Read that block and seek within it
    pub fn get(&self, user_key: &[u8], snapshot: SequenceNumber) -> Result<Option<LookupResult>> {
        if !self.filter.may_contain(user_key) {
            return Ok(None);
        }

        let lookup = InternalKey::new(user_key.to_vec(), snapshot, ValueType::Put).encode();
        let Some(block_idx) = self.find_block(&lookup) else {
            return Ok(None);
        };

        let block = self.read_data_block(block_idx)?;
        let pos = block.seek(&lookup, &self.comparator);
        if pos >= block.len() {
            return Ok(None);
        }
        let (key, value) = block.entry(pos);
        let parsed = ParsedInternalKey::parse(key)?;
        if self
            .comparator
            .user_comparator()
            .compare(parsed.user_key, user_key)
            != Ordering::Equal
        {
            return Ok(None);
        }
        Ok(Some(match parsed.value_type {
            ValueType::Put => LookupResult::Found(value.to_vec()),
            ValueType::Delete => LookupResult::Deleted,
        }))
    }

    /// Iterator over every record in the table. Starts unpositioned.
    pub fn iter(self: &Arc<Self>) -> TableIterator {
        TableIterator {
            table: Arc::clone(self),
            block_idx: self.index.len(),
            block: None,
            entry_idx: 0,
            status: Ok(()),
        }
    }

    /// First block whose last key >= target.
    fn find_block(&self, target: &[u8]) -> Option<usize> {
        let idx = self
            .index
            .partition_point(|e| self.comparator.compare(&e.last_key, target) == Ordering::Less);
        (idx < self.index.len()).then_some(idx)
    }

    fn read_data_block(&self, block_idx: usize) -> Result<Block> {
        let data = read_block(self.file.as_ref(), self.index[block_idx].handle)?;
        Block::decode(data)
    }
}

/// Read a block and verify its CRC32 trailer.
fn read_block(file: &dyn RandomAccessFile, handle: BlockHandle) -> Result<Vec<u8>> {
    let len = usize::try_from(handle.size)
        .map_err(|_| Error::Corruption(format!("block size {} too large", handle.size)))?;
    let mut buf = file.read_at(handle.offset, len + BLOCK_TRAILER_SIZE)?;
    let trailer = buf.split_off(len);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32fast::hash(&buf);
    if stored != actual {
        return Err(Error::Corruption(format!(
            "block checksum mismatch at offset {}: stored {stored:#010x}, computed {actual:#010x}",
            handle.offset
        )));
    }
    Ok(buf)
}

/// Iterator over every record of a [`Table`], one data block at a time.
///
/// Blocks are checksummed as they are loaded; a bad block ends iteration
/// and is reported through [`status`](StorageIterator::status).
pub struct TableIterator {
    table: Arc<Table>,
    block_idx: usize,
    block: Option<Block>,
    entry_idx: usize,
    status: Result<()>,
}

impl TableIterator {
    /// Load block `block_idx` positioned at `entry_idx`, skipping forward
    /// over exhausted blocks.
    fn load_from(&mut self, mut block_idx: usize, mut entry_idx: usize) {
        self.block = None;
        while self.status.is_ok() && block_idx < self.table.index.len() {
            match self.table.read_data_block(block_idx) {
                Ok(block) if entry_idx < block.len() => {
                    self.block_idx = block_idx;
                    self.entry_idx = entry_idx;
                    self.block = Some(block);
                    return;
                }
                Ok(_) => {
                    block_idx += 1;
                    entry_idx = 0;
                }
                Err(e) => self.status = Err(e),
            }
        }
        self.block_idx = self.table.index.len();
    }

    fn current(&self) -> (&[u8], &[u8]) {
        let block = self
            .block
            .as_ref()
            .expect("TableIterator used while not valid");
        block.entry(self.entry_idx)
    }
}

impl StorageIterator for TableIterator {
    fn seek_to_first(&mut self) {
        self.load_from(0, 0);
    }

    fn seek(&mut self, target: &[u8]) {
        match self.table.find_block(target) {
            Some(block_idx) => match self.table.read_data_block(block_idx) {
                Ok(block) => {
                    let entry_idx = block.seek(target, &self.table.comparator);
                    self.load_from(block_idx, entry_idx);
                }
                Err(e) => {
                    self.status = Err(e);
                    self.block = None;
                }
            },
            None => self.block = None,
        }
    }

    fn is_valid(&self) -> bool {
        self.block.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current().0
    }

    fn value(&self) -> &[u8] {
        self.current().1
    }

    fn next(&mut self) {
        let Some(block) = &self.block else {
            return;
        };
        if self.entry_idx + 1 < block.len() {
            self.entry_idx += 1;
        } else {
            self.load_from(self.block_idx + 1, 0);
        }
    }

    fn status(&self) -> Result<()> {
        self.status.clone()
    }
}
