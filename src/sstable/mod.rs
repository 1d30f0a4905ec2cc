//! The sorted table file format.
//!
//! ```text
//! ┌───────────────┬─────┬───────────────┬──────────────┬─────────────┬────────┐
//! │ data block 0  │ ... │ data block N  │ filter block │ index block │ footer │
//! └───────────────┴─────┴───────────────┴──────────────┴─────────────┴────────┘
//! ```
//!
//! Every block is followed by a 4-byte CRC32 of its contents.

pub mod block;
pub mod builder;
pub mod footer;
pub mod reader;

pub use builder::{TableBuilder, TableOutcome};
pub use reader::{LookupResult, Table, TableIterator};
