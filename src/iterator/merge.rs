use std::cmp::Ordering;

use crate::comparator::InternalKeyComparator;
use crate::error::Result;
use crate::iterator::StorageIterator;

/// Merges multiple sorted iterators into a single sorted stream.
///
/// Used to feed compaction input into a table build. Ordering guarantee:
/// records are yielded in internal-key order (user key ASC, sequence DESC).
/// Nothing is dropped here; collapsing older versions is the build's job,
/// where the snapshot rules are known.
///
/// With a handful of children a linear scan for the smallest key beats a
/// heap, so that is what `find_smallest` does.
pub struct MergingIterator {
    children: Vec<Box<dyn StorageIterator>>,
    comparator: InternalKeyComparator,
    current: Option<usize>,
}

impl MergingIterator {
    /// Sources are ordered by priority: index 0 = newest. On identical
    /// internal keys the lower index wins.
    pub fn new(children: Vec<Box<dyn StorageIterator>>, comparator: InternalKeyComparator) -> Self {
        MergingIterator {
            children,
            comparator,
            current: None,
        }
    }

    fn find_smallest(&mut self) {
        let mut smallest: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.is_valid() {
                continue;
            }
            smallest = match smallest {
                Some(s)
                    if self.comparator.compare(child.key(), self.children[s].key())
                        != Ordering::Less =>
                {
                    Some(s)
                }
                _ => Some(i),
            };
        }
        self.current = smallest;
    }
}

impl StorageIterator for MergingIterator {
    fn seek_to_first(&mut self) {
        for child in &mut self.children {
            child.seek_to_first();
        }
        self.find_smallest();
    }

    fn seek(&mut self, target: &[u8]) {
        for child in &mut self.children {
            child.seek(target);
        }
        self.find_smallest();
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        let i = self.current.expect("key() on invalid MergingIterator");
        self.children[i].key()
    }

    fn value(&self) -> &[u8] {
        let i = self.current.expect("value() on invalid MergingIterator");
        self.children[i].value()
    }

    fn next(&mut self) {
        if let Some(i) = self.current {
            self.children[i].next();
            self.find_smallest();
        }
    }

    fn status(&self) -> Result<()> {
        for child in &self.children {
            child.status()?;
        }
        Ok(())
    }
}
