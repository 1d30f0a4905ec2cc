//! Storage backend abstraction.
//!
//! The build pipeline never touches `std::fs` directly. It creates, syncs,
//! closes and deletes files through an [`Env`], so the same code runs
//! against the real filesystem ([`StdEnv`]) and against memory ([`MemEnv`]).
//!
//! Implementations must be safe for concurrent use: several builds may run
//! at once against one `Env`, each writing its own file.

pub mod memory;
pub mod std_fs;

use std::path::Path;

use crate::error::Result;

pub use memory::MemEnv;
pub use std_fs::StdEnv;

/// Sequential, append-only output file.
///
/// Two layers of durability:
///   flush()        → user-space buffer → OS page cache
///   sync()/fsync() → OS page cache → physical disk
pub trait WritableFile: Send {
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Push buffered bytes to the OS.
    fn flush(&mut self) -> Result<()>;

    /// Best-effort sync of file data (`fdatasync`-like).
    fn sync(&mut self) -> Result<()>;

    /// Strict sync of data and metadata (`fsync`-like).
    fn fsync(&mut self) -> Result<()>;

    /// Flush and release the handle.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Positional reads over an immutable file.
pub trait RandomAccessFile: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;

    fn size(&self) -> u64;
}

/// File-system operations used by table builds and the table cache.
pub trait Env: Send + Sync {
    /// Create (or truncate) a file for writing.
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;

    fn new_random_access_file(&self, path: &Path) -> Result<Box<dyn RandomAccessFile>>;

    fn delete_file(&self, path: &Path) -> Result<()>;

    fn file_exists(&self, path: &Path) -> bool;

    fn file_size(&self, path: &Path) -> Result<u64>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;
}
