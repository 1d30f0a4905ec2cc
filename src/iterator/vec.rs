use std::cmp::Ordering;

use crate::comparator::InternalKeyComparator;
use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::types::{InternalKey, SequenceNumber, ValueType};

/// Iterator over an owned, already sorted list of records.
///
/// This is the shape a frozen write buffer hands to a flush.
pub struct VecIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    comparator: InternalKeyComparator,
    pos: usize,
}

impl VecIterator {
    /// Wrap records that are already in internal-key order.
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>, comparator: InternalKeyComparator) -> Self {
        let pos = entries.len();
        VecIterator {
            entries,
            comparator,
            pos,
        }
    }

    /// Sort arbitrary records into internal-key order first.
    pub fn from_unsorted(
        mut entries: Vec<(Vec<u8>, Vec<u8>)>,
        comparator: InternalKeyComparator,
    ) -> Self {
        entries.sort_by(|a, b| comparator.compare(&a.0, &b.0));
        Self::new(entries, comparator)
    }

    /// Build from `(user_key, sequence, type, value)` tuples, sorting them.
    pub fn from_records<K, V>(
        records: impl IntoIterator<Item = (K, SequenceNumber, ValueType, V)>,
        comparator: InternalKeyComparator,
    ) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let entries = records
            .into_iter()
            .map(|(k, seq, vt, v)| (InternalKey::new(k, seq, vt).encode(), v.into()))
            .collect();
        Self::from_unsorted(entries, comparator)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest sequence number present, if any record parses.
    pub fn earliest_sequence(&self) -> Option<SequenceNumber> {
        self.entries
            .iter()
            .filter_map(|(k, _)| InternalKey::decode(k).ok())
            .map(|k| k.sequence)
            .min()
    }
}

impl StorageIterator for VecIterator {
    fn seek_to_first(&mut self) {
        self.pos = 0;
    }

    fn seek(&mut self, target: &[u8]) {
        self.pos = self
            .entries
            .partition_point(|(k, _)| self.comparator.compare(k, target) == Ordering::Less);
    }

    fn is_valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos].1
    }

    fn next(&mut self) {
        self.pos += 1;
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}
