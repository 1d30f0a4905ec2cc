pub mod merge;
pub mod vec;

use crate::error::Result;

pub use merge::MergingIterator;
pub use vec::VecIterator;

/// The central iteration abstraction: a forward-only stream of
/// `(encoded internal key, value)` records.
///
/// Every sorted data source (memtable snapshot, table, merged view)
/// implements this trait, so a flush and a compaction feed the same build
/// pipeline. Records come in internal-key order: user key ascending, then
/// sequence number descending.
///
/// Errors do not interrupt iteration calls. A source that hits a fault
/// stops being valid and reports the fault from [`status`](Self::status),
/// which callers must check once they are done.
pub trait StorageIterator {
    /// Position at the first record.
    fn seek_to_first(&mut self);

    /// Position at the first record with key >= target.
    fn seek(&mut self, target: &[u8]);

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Returns the current key. Only valid when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only valid when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Advance to the next record. Only valid when is_valid() is true.
    fn next(&mut self);

    /// First fault the source hit, if any.
    fn status(&self) -> Result<()>;
}
