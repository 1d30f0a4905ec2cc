//! # LSM table builds
//!
//! The write-path step of a Log-Structured Merge-Tree that turns a sorted
//! stream of versioned records into an immutable table file on disk.
//!
//! ## Core idea
//! A memtable flush and a compaction both end the same way: walk a sorted
//! iterator, optionally drop versions no reader can see any more, write the
//! survivors into a table, make the file durable and read it back once
//! before anyone else may use it. [`build_table`] does exactly that and
//! either leaves a verified table behind or nothing at all.
//!
//! ```no_run
//! use std::sync::Arc;
//! use lsm_flush::{build_table, BuildContext, FileMetaData, Options, StdEnv, VisibilityWindow};
//! use lsm_flush::{InternalKeyComparator, ValueType, VecIterator};
//!
//! # fn main() -> lsm_flush::Result<()> {
//! let ctx = BuildContext::new("/tmp/db", Arc::new(StdEnv::new()), Options::default());
//! let mut records = VecIterator::from_records(
//!     vec![("apple", 2, ValueType::Put, "red"), ("pear", 1, ValueType::Put, "green")],
//!     InternalKeyComparator::default(),
//! );
//! let mut meta = FileMetaData::new(1);
//! build_table(&ctx, &mut records, &mut meta, VisibilityWindow::new(0, 1))?;
//! assert!(meta.has_table());
//! # Ok(())
//! # }
//! ```

pub mod bloom;
pub mod build;
pub mod comparator;
pub mod env;
pub mod error;
pub mod filename;
pub mod iterator;
pub mod options;
pub mod sstable;
pub mod table_cache;
pub mod types;

// Public re-exports for the top-level API
pub use build::{build_table, BuildContext, FileMetaData, VisibilityWindow};
pub use comparator::{BytewiseComparator, Comparator, InternalKeyComparator};
pub use env::{Env, MemEnv, StdEnv};
pub use error::{Error, ErrorKind, Result};
pub use iterator::{MergingIterator, StorageIterator, VecIterator};
pub use options::{Options, SyncMode};
pub use table_cache::TableCache;
pub use types::{InternalKey, SequenceNumber, ValueType};
