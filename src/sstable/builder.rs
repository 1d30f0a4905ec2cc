use std::cmp::Ordering;

use crate::bloom::builder::BloomFilterBuilder;
use crate::comparator::InternalKeyComparator;
use crate::env::WritableFile;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::sstable::block::builder::BlockBuilder;
use crate::sstable::footer::{BlockHandle, Footer, IndexEntry};
use crate::types::ParsedInternalKey;

/// How a [`TableBuilder`] ended. Both paths consume the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOutcome {
    /// Every block, the index and the footer reached the file.
    Finished { file_size: u64 },
    /// Buffered state was discarded. The file holds a partial table.
    Abandoned,
}

/// Builds a table file from a sorted stream of internal keys.
///
/// Used during:
/// - Memtable flush (sorted memtable → table)
/// - Compaction (merged iterators → new tables)
///
/// Build process:
/// 1. Add entries one by one (strictly increasing internal keys)
/// 2. Entries fill up blocks; when a block is full it's written to the file
/// 3. finish() flushes the last block, writes filter, index and footer
///
/// The builder borrows the file and never syncs or closes it; durability
/// is the caller's step once the builder is gone.
pub struct TableBuilder<'a> {
    file: &'a mut dyn WritableFile,
    comparator: InternalKeyComparator,
    /// Current block being filled with entries.
    block_builder: BlockBuilder,
    block_size: usize,
    /// Index entries: one per flushed data block.
    index_entries: Vec<IndexEntry>,
    filter: BloomFilterBuilder,
    /// Bytes handed to the file so far.
    offset: u64,
    /// Last key added; doubles as the last key of the current block.
    last_key: Vec<u8>,
    entry_count: u64,
    /// First error seen. Once set, every later call reports it.
    status: Result<()>,
}

impl<'a> TableBuilder<'a> {
    pub fn new(
        options: &Options,
        comparator: InternalKeyComparator,
        file: &'a mut dyn WritableFile,
    ) -> Self {
        TableBuilder {
            file,
            comparator,
            block_builder: BlockBuilder::new(options.block_size),
            block_size: options.block_size,
            index_entries: Vec::new(),
            filter: BloomFilterBuilder::new(options.bloom_false_positive_rate),
            offset: 0,
            last_key: Vec::new(),
            entry_count: 0,
            status: Ok(()),
        }
    }

    /// Add an entry. Keys must be encoded internal keys in strictly
    /// increasing order under the builder's comparator.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.status.clone()?;

        let parsed = match ParsedInternalKey::parse(key) {
            Ok(parsed) => parsed,
            Err(e) => return self.fail(Error::Integrity(format!("malformed internal key: {e}"))),
        };
        if self.entry_count > 0 && self.comparator.compare(key, &self.last_key) != Ordering::Greater
        {
            return self.fail(Error::Integrity(format!(
                "keys added out of order: {:?}@{} after {:?}",
                String::from_utf8_lossy(parsed.user_key),
                parsed.sequence,
                String::from_utf8_lossy(crate::types::extract_user_key(&self.last_key)),
            )));
        }

        if !self.block_builder.add(key, value) {
            self.flush_block()?;
            // first entry of a fresh block is always accepted
            let accepted = self.block_builder.add(key, value);
            debug_assert!(accepted);
        }

        self.filter.add_key(parsed.user_key);
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.entry_count += 1;
        Ok(())
    }

    /// Write the current block and record an index entry for it.
    fn flush_block(&mut self) -> Result<()> {
        if self.block_builder.is_empty() {
            return Ok(());
        }
        let old_builder = std::mem::replace(
            &mut self.block_builder,
            BlockBuilder::new(self.block_size),
        );
        let handle = self.write_block(&old_builder.build())?;
        self.index_entries.push(IndexEntry {
            last_key: self.last_key.clone(),
            handle,
        });
        Ok(())
    }

    /// Append `block` plus its CRC32 trailer.
    fn write_block(&mut self, block: &[u8]) -> Result<BlockHandle> {
        let handle = BlockHandle {
            offset: self.offset,
            size: block.len() as u64,
        };
        let crc = crc32fast::hash(block);
        let appended = self
            .file
            .append(block)
            .and_then(|_| self.file.append(&crc.to_le_bytes()));
        if let Err(e) = appended {
            return self.fail(Error::WriteFailed(e.to_string()));
        }
        self.offset = match handle.end() {
            Ok(end) => end,
            Err(e) => return self.fail(e),
        };
        Ok(handle)
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        if self.status.is_ok() {
            self.status = Err(err.clone());
        }
        Err(err)
    }

    /// Finalize the table: last data block, filter block, index block, footer.
    pub fn finish(mut self) -> Result<TableOutcome> {
        self.status.clone()?;
        self.flush_block()?;

        let filter = self.filter.build().serialize();
        let filter_handle = self.write_block(&filter)?;

        let mut index_data = Vec::new();
        for entry in &self.index_entries {
            entry.encode_to(&mut index_data);
        }
        let index_handle = self.write_block(&index_data)?;

        let footer = Footer {
            index: index_handle,
            filter: filter_handle,
            entry_count: self.entry_count,
        };
        let flushed = self
            .file
            .append(&footer.encode())
            .and_then(|_| self.file.flush());
        if let Err(e) = flushed {
            return self.fail(Error::WriteFailed(e.to_string()));
        }
        self.offset += Footer::SIZE as u64;

        Ok(TableOutcome::Finished {
            file_size: self.offset,
        })
    }

    /// Drop buffered blocks without writing the index or footer.
    pub fn abandon(self) -> TableOutcome {
        TableOutcome::Abandoned
    }

    /// Bytes written to the file so far (final size after `finish`).
    pub fn file_size(&self) -> u64 {
        self.offset
    }

    pub fn num_entries(&self) -> u64 {
        self.entry_count
    }

    pub fn status(&self) -> Result<()> {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Env, MemEnv};
    use crate::error::ErrorKind;
    use crate::sstable::footer::SSTABLE_MAGIC;
    use crate::types::{InternalKey, ValueType};
    use std::path::Path;

    fn ikey(user: &str, seq: u64) -> Vec<u8> {
        InternalKey::new(user.as_bytes().to_vec(), seq, ValueType::Put).encode()
    }

    fn build(entries: &[(Vec<u8>, &[u8])], block_size: usize) -> (MemEnv, Result<TableOutcome>) {
        let env = MemEnv::new();
        let path = Path::new("/db/000001.sst");
        let mut file = env.new_writable_file(path).unwrap();
        let options = Options::default().with_block_size(block_size);
        let mut builder =
            TableBuilder::new(&options, InternalKeyComparator::default(), file.as_mut());
        for (k, v) in entries {
            builder.add(k, v).unwrap();
        }
        let outcome = builder.finish();
        (env, outcome)
    }

    #[test]
    fn finish_reports_bytes_written() {
        let entries: Vec<_> = (0..100u32)
            .map(|i| (ikey(&format!("key_{i:05}"), 1), b"value".as_slice()))
            .collect();
        let (env, outcome) = build(&entries, 4096);

        let file_size = match outcome.unwrap() {
            TableOutcome::Finished { file_size } => file_size,
            other => panic!("unexpected {other:?}"),
        };
        let bytes = env.contents(Path::new("/db/000001.sst")).unwrap();
        assert_eq!(bytes.len() as u64, file_size);

        let footer = Footer::decode(&bytes[bytes.len() - Footer::SIZE..]).unwrap();
        assert_eq!(footer.entry_count, 100);
        assert!(footer.index.offset > footer.filter.offset);
        assert_eq!(
            u64::from_le_bytes(bytes[bytes.len() - 8..].try_into().unwrap()),
            SSTABLE_MAGIC
        );
    }

    #[test]
    fn tiny_blocks_produce_many_index_entries() {
        let entries: Vec<_> = (0..20u32)
            .map(|i| (ikey(&format!("key_{i:05}"), 1), b"value_xxxxx".as_slice()))
            .collect();
        let (env, outcome) = build(&entries, 64);
        assert!(matches!(outcome.unwrap(), TableOutcome::Finished { .. }));

        let bytes = env.contents(Path::new("/db/000001.sst")).unwrap();
        let footer = Footer::decode(&bytes[bytes.len() - Footer::SIZE..]).unwrap();
        // one entry per block: key_len(4) + 17-byte internal key + handle(16)
        assert_eq!(footer.index.size, 20 * (4 + 17 + 16));
    }

    #[test]
    fn out_of_order_key_is_sticky_integrity_error() {
        let env = MemEnv::new();
        let mut file = env.new_writable_file(Path::new("/db/1.sst")).unwrap();
        let options = Options::default();
        let mut builder =
            TableBuilder::new(&options, InternalKeyComparator::default(), file.as_mut());

        builder.add(&ikey("b", 5), b"").unwrap();
        let err = builder.add(&ikey("a", 9), b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityViolation);

        // later, well-ordered adds still fail
        assert!(builder.add(&ikey("c", 1), b"").is_err());
        assert!(builder.status().is_err());
        assert_eq!(builder.num_entries(), 1);
        assert_eq!(builder.abandon(), TableOutcome::Abandoned);
    }

    #[test]
    fn duplicate_internal_key_is_rejected() {
        let env = MemEnv::new();
        let mut file = env.new_writable_file(Path::new("/db/1.sst")).unwrap();
        let options = Options::default();
        let mut builder =
            TableBuilder::new(&options, InternalKeyComparator::default(), file.as_mut());
        builder.add(&ikey("a", 5), b"").unwrap();
        assert!(builder.add(&ikey("a", 5), b"").is_err());
    }

    #[test]
    fn malformed_key_is_rejected() {
        let env = MemEnv::new();
        let mut file = env.new_writable_file(Path::new("/db/1.sst")).unwrap();
        let options = Options::default();
        let mut builder =
            TableBuilder::new(&options, InternalKeyComparator::default(), file.as_mut());
        let err = builder.add(b"short", b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    }
}
