// Shared fixtures for the integration tests: an Env that fails on demand and
// a record stream that breaks part way through.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use lsm_flush::env::{RandomAccessFile, WritableFile};
use lsm_flush::{
    BuildContext, Env, Error, FileMetaData, InternalKey, InternalKeyComparator, MemEnv, Options,
    Result, StorageIterator, ValueType, VecIterator,
};
use parking_lot::Mutex;

/// Which operations a [`FaultyEnv`] should break.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub create: bool,
    /// Appends that succeed before every later one fails.
    pub appends_before_failure: Option<usize>,
    pub sync: bool,
    pub fsync: bool,
    pub close: bool,
    /// Flip the last byte of every read.
    pub corrupt_reads: bool,
    pub delete: bool,
}

/// [`MemEnv`] wrapper with switchable faults.
#[derive(Clone, Default)]
pub struct FaultyEnv {
    pub inner: MemEnv,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyEnv {
    pub fn new(faults: Faults) -> Self {
        FaultyEnv {
            inner: MemEnv::new(),
            faults: Arc::new(Mutex::new(faults)),
        }
    }

    pub fn set(&self, faults: Faults) {
        *self.faults.lock() = faults;
    }

    fn faults(&self) -> Faults {
        self.faults.lock().clone()
    }
}

fn injected(what: &str) -> Error {
    std::io::Error::other(format!("injected {what} failure")).into()
}

impl Env for FaultyEnv {
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        if self.faults().create {
            return Err(injected("create"));
        }
        Ok(Box::new(FaultyWritableFile {
            inner: self.inner.new_writable_file(path)?,
            faults: Arc::clone(&self.faults),
            appends: 0,
        }))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Box<dyn RandomAccessFile>> {
        Ok(Box::new(FaultyRandomAccessFile {
            inner: self.inner.new_random_access_file(path)?,
            corrupt: self.faults().corrupt_reads,
        }))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        if self.faults().delete {
            return Err(injected("delete"));
        }
        self.inner.delete_file(path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.inner.file_exists(path)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        self.inner.file_size(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.create_dir_all(path)
    }
}

struct FaultyWritableFile {
    inner: Box<dyn WritableFile>,
    faults: Arc<Mutex<Faults>>,
    appends: usize,
}

impl WritableFile for FaultyWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        if let Some(limit) = self.faults.lock().appends_before_failure {
            if self.appends >= limit {
                return Err(injected("append"));
            }
        }
        self.appends += 1;
        self.inner.append(data)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn sync(&mut self) -> Result<()> {
        if self.faults.lock().sync {
            return Err(injected("sync"));
        }
        self.inner.sync()
    }

    fn fsync(&mut self) -> Result<()> {
        if self.faults.lock().fsync {
            return Err(injected("fsync"));
        }
        self.inner.fsync()
    }

    fn close(self: Box<Self>) -> Result<()> {
        if self.faults.lock().close {
            return Err(injected("close"));
        }
        self.inner.close()
    }
}

struct FaultyRandomAccessFile {
    inner: Box<dyn RandomAccessFile>,
    corrupt: bool,
}

impl RandomAccessFile for FaultyRandomAccessFile {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut data = self.inner.read_at(offset, len)?;
        if self.corrupt {
            if let Some(last) = data.last_mut() {
                *last ^= 0xFF;
            }
        }
        Ok(data)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

/// Yields the first `fail_after` records of `inner`, then goes invalid and
/// reports `error`.
pub struct FaultyIterator {
    inner: VecIterator,
    fail_after: usize,
    yielded: usize,
    error: Error,
    failed: bool,
}

impl FaultyIterator {
    pub fn new(inner: VecIterator, fail_after: usize) -> Self {
        Self::with_error(
            inner,
            fail_after,
            Error::SourceStream("injected stream fault".into()),
        )
    }

    pub fn with_error(inner: VecIterator, fail_after: usize, error: Error) -> Self {
        FaultyIterator {
            inner,
            fail_after,
            yielded: 0,
            error,
            failed: false,
        }
    }

    fn check(&mut self) {
        if self.yielded >= self.fail_after {
            self.failed = true;
        }
    }
}

impl StorageIterator for FaultyIterator {
    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
        self.yielded = 0;
        self.failed = false;
        self.check();
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
        self.check();
    }

    fn is_valid(&self) -> bool {
        !self.failed && self.inner.is_valid()
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }

    fn next(&mut self) {
        self.inner.next();
        self.yielded += 1;
        self.check();
    }

    fn status(&self) -> Result<()> {
        if self.failed {
            return Err(self.error.clone());
        }
        Ok(())
    }
}

/// Sorted stream of `(user_key, sequence, value)` puts.
pub fn puts(records: &[(&str, u64, &str)]) -> VecIterator {
    VecIterator::from_records(
        records
            .iter()
            .map(|&(k, seq, v)| (k, seq, ValueType::Put, v)),
        InternalKeyComparator::default(),
    )
}

/// `n` distinct keys, `versions` versions each, sequences counting down.
pub fn versioned(n: usize, versions: u64) -> VecIterator {
    let mut records = Vec::new();
    for i in 0..n {
        for v in 0..versions {
            let seq = 1 + (i as u64) * versions + v;
            records.push((
                format!("key_{i:05}"),
                seq,
                ValueType::Put,
                format!("val_{i:05}_{seq}"),
            ));
        }
    }
    VecIterator::from_records(records, InternalKeyComparator::default())
}

pub fn context(env: Arc<dyn Env>, options: Options) -> BuildContext {
    BuildContext::new("/db", env, options)
}

/// Every record of a committed table, in order.
pub fn read_table(ctx: &BuildContext, meta: &FileMetaData) -> Vec<(InternalKey, Vec<u8>)> {
    let mut iter = ctx
        .table_cache
        .new_iterator(meta.number, meta.file_size)
        .unwrap();
    iter.seek_to_first();
    let mut out = Vec::new();
    while iter.is_valid() {
        out.push((InternalKey::decode(iter.key()).unwrap(), iter.value().to_vec()));
        iter.next();
    }
    iter.status().unwrap();
    out
}
