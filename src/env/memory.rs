// In-memory storage backend.
//
// Keeps every file as a byte vector keyed by path. Used for unit tests and
// benchmarks that should measure the build pipeline rather than the disk.
// Not durable: contents vanish when the last handle is dropped.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::env::{Env, RandomAccessFile, WritableFile};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MemFile {
    data: Vec<u8>,
    data_syncs: u32,
    full_syncs: u32,
    closed: bool,
}

type SharedFile = Arc<Mutex<MemFile>>;

/// In-memory [`Env`]. Cloning shares the same file set.
#[derive(Debug, Default, Clone)]
pub struct MemEnv {
    files: Arc<Mutex<HashMap<PathBuf, SharedFile>>>,
}

impl MemEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Full contents of a file.
    pub fn contents(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(self.get(path)?.lock().data.clone())
    }

    /// `(best_effort_syncs, strict_syncs)` issued against a file.
    pub fn sync_counts(&self, path: &Path) -> Option<(u32, u32)> {
        let file = self.files.lock().get(path).cloned()?;
        let file = file.lock();
        Some((file.data_syncs, file.full_syncs))
    }

    /// Whether the file's writer was closed.
    pub fn is_closed(&self, path: &Path) -> Option<bool> {
        let file = self.files.lock().get(path).cloned()?;
        let closed = file.lock().closed;
        Some(closed)
    }

    /// Overwrite a file's contents in place (corruption tests).
    pub fn replace_contents(&self, path: &Path, data: Vec<u8>) -> Result<()> {
        self.get(path)?.lock().data = data;
        Ok(())
    }

    fn get(&self, path: &Path) -> Result<SharedFile> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display())).into()
}

impl Env for MemEnv {
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file: SharedFile = Arc::default();
        self.files.lock().insert(path.to_path_buf(), Arc::clone(&file));
        Ok(Box::new(MemWritableFile { file }))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Box<dyn RandomAccessFile>> {
        let data = self.get(path)?.lock().data.clone();
        Ok(Box::new(MemRandomAccessFile { data }))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(self.get(path)?.lock().data.len() as u64)
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

struct MemWritableFile {
    file: SharedFile,
}

impl MemWritableFile {
    fn check_open(file: &MemFile) -> Result<()> {
        if file.closed {
            return Err(io::Error::other("file is closed").into());
        }
        Ok(())
    }
}

impl WritableFile for MemWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        Self::check_open(&file)?;
        file.data.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Self::check_open(&self.file.lock())
    }

    fn sync(&mut self) -> Result<()> {
        let mut file = self.file.lock();
        Self::check_open(&file)?;
        file.data_syncs += 1;
        Ok(())
    }

    fn fsync(&mut self) -> Result<()> {
        let mut file = self.file.lock();
        Self::check_open(&file)?;
        file.full_syncs += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.file.lock().closed = true;
        Ok(())
    }
}

/// Snapshot of a file's bytes taken at open time.
struct MemRandomAccessFile {
    data: Vec<u8>,
}

impl RandomAccessFile for MemRandomAccessFile {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(self.data[start..end].to_vec()),
            _ => Err(Error::Corruption(format!(
                "read of {len} bytes at {offset} past end of {}-byte file",
                self.data.len()
            ))),
        }
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_write_and_read() {
        let env = MemEnv::new();
        let path = Path::new("/db/000001.sst");

        let mut file = env.new_writable_file(path).unwrap();
        file.append(b"hello").unwrap();
        file.append(b" world").unwrap();

        assert_eq!(env.file_size(path).unwrap(), 11);
        let reader = env.new_random_access_file(path).unwrap();
        assert_eq!(reader.read_at(0, 5).unwrap(), b"hello");
        assert!(reader.read_at(6, 10).is_err());
    }

    #[test]
    fn test_sync_counts_and_close() {
        let env = MemEnv::new();
        let path = Path::new("/db/a.sst");

        let mut file = env.new_writable_file(path).unwrap();
        file.sync().unwrap();
        file.fsync().unwrap();
        file.fsync().unwrap();
        assert_eq!(env.sync_counts(path), Some((1, 2)));
        assert_eq!(env.is_closed(path), Some(false));

        file.close().unwrap();
        assert_eq!(env.is_closed(path), Some(true));
    }

    #[test]
    fn test_delete() {
        let env = MemEnv::new();
        let path = Path::new("/db/a.sst");
        env.new_writable_file(path).unwrap();

        assert!(env.file_exists(path));
        env.delete_file(path).unwrap();
        assert!(!env.file_exists(path));
        assert!(env.delete_file(path).is_err());
        assert_eq!(env.file_count(), 0);
    }

    #[test]
    fn test_clones_share_files() {
        let env = MemEnv::new();
        let other = env.clone();
        env.new_writable_file(Path::new("/db/a.sst")).unwrap();
        assert_eq!(other.paths(), vec![PathBuf::from("/db/a.sst")]);
    }
}
