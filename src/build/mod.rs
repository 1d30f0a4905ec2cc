//! Turning a sorted record stream into a durable, verified table file.
//!
//! `build_table` is the single entry point. One call walks this path:
//!
//! ```text
//! Start → Opened → Writing → Finalizing → Syncing → Closing → Verifying → Committed
//!            \________\__________\___________\_________\__________\_____→ Deleted
//! ```
//!
//! Any failure jumps straight to `Deleted`: the caller either gets `Ok(())`
//! with `file_size > 0` and a readable table at
//! [`table_file_name`](crate::filename::table_file_name), or no file at all.

pub mod elision;
pub mod staged;

use std::path::PathBuf;
use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator, InternalKeyComparator};
use crate::env::{Env, WritableFile};
use crate::error::{Error, Result};
use crate::filename::table_file_name;
use crate::iterator::StorageIterator;
use crate::options::Options;
use crate::sstable::{TableBuilder, TableOutcome};
use crate::table_cache::TableCache;
use crate::types::{InternalKey, SequenceNumber};

use elision::RecordSink;
use staged::{remove_if_present, StagedTable};

/// The two sequence numbers that decide whether old versions may be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityWindow {
    /// Highest sequence number a live reader may still observe.
    pub newest_active_snapshot: SequenceNumber,
    /// Lowest sequence number present in the source stream.
    pub earliest_in_source: SequenceNumber,
}

impl VisibilityWindow {
    pub fn new(newest_active_snapshot: SequenceNumber, earliest_in_source: SequenceNumber) -> Self {
        VisibilityWindow {
            newest_active_snapshot,
            earliest_in_source,
        }
    }

    /// True when every record in the stream is newer than every snapshot,
    /// so no reader can need a superseded version.
    pub fn permits_elision(&self) -> bool {
        self.earliest_in_source > self.newest_active_snapshot
    }
}

/// Description of one table file. The caller sets `number`; a build fills
/// in the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetaData {
    pub number: u64,
    /// Zero means no table was produced.
    pub file_size: u64,
    pub smallest: InternalKey,
    pub largest: InternalKey,
    /// Records written to the table.
    pub entries: u64,
}

impl FileMetaData {
    pub fn new(number: u64) -> Self {
        FileMetaData {
            number,
            ..Default::default()
        }
    }

    pub fn has_table(&self) -> bool {
        self.file_size > 0
    }
}

/// Long-lived collaborators shared by every build of one database.
///
/// Cheap to share across threads: concurrent builds are fine as long as
/// each targets its own file number.
#[derive(Clone)]
pub struct BuildContext {
    pub dbname: PathBuf,
    pub env: Arc<dyn Env>,
    pub options: Options,
    pub table_cache: Arc<TableCache>,
    pub user_comparator: Arc<dyn Comparator>,
}

impl BuildContext {
    /// Context ordering user keys bytewise, with its own table cache.
    pub fn new(dbname: impl Into<PathBuf>, env: Arc<dyn Env>, options: Options) -> Self {
        Self::with_comparator(dbname, env, options, Arc::new(BytewiseComparator))
    }

    pub fn with_comparator(
        dbname: impl Into<PathBuf>,
        env: Arc<dyn Env>,
        options: Options,
        user_comparator: Arc<dyn Comparator>,
    ) -> Self {
        let dbname = dbname.into();
        let table_cache = Arc::new(TableCache::new(
            dbname.clone(),
            Arc::clone(&env),
            InternalKeyComparator::new(Arc::clone(&user_comparator)),
            options.table_cache_capacity,
        ));
        BuildContext {
            dbname,
            env,
            options,
            table_cache,
            user_comparator,
        }
    }

    pub fn internal_comparator(&self) -> InternalKeyComparator {
        InternalKeyComparator::new(Arc::clone(&self.user_comparator))
    }

    pub fn table_path(&self, number: u64) -> PathBuf {
        table_file_name(&self.dbname, number)
    }
}

/// Build table `meta.number` from `iter`.
///
/// On `Ok(())` with `meta.file_size > 0` the table is synced (per
/// [`Options::sync_mode`]), closed and has been read back successfully. An
/// empty stream yields `Ok(())` with `file_size == 0` and no file. On any
/// error no file is left behind and `meta.file_size` is zero. A fault
/// reported by `iter` takes precedence over every other outcome.
pub fn build_table(
    ctx: &BuildContext,
    iter: &mut dyn StorageIterator,
    meta: &mut FileMetaData,
    window: VisibilityWindow,
) -> Result<()> {
    meta.file_size = 0;
    meta.entries = 0;
    iter.seek_to_first();

    let path = ctx.table_path(meta.number);
    let purge = ctx.options.purge_redundant && window.permits_elision();
    if ctx.options.purge_redundant && !purge {
        log::debug!(
            "Table {}: keeping all versions, snapshot {} is not older than earliest sequence {}",
            meta.number,
            window.newest_active_snapshot,
            window.earliest_in_source
        );
    }

    let mut staged = None;
    let mut status = if iter.is_valid() {
        log::info!("Building table {} at {}", meta.number, path.display());
        match StagedTable::create(ctx.env.as_ref(), path.clone()) {
            Ok((table, file)) => {
                staged = Some(table);
                write_and_verify(ctx, file, iter, meta, purge, window)
            }
            Err(e) => Err(e),
        }
    } else {
        Ok(())
    };

    if let Err(e) = iter.status() {
        status = Err(match e {
            stream @ Error::SourceStream(_) => stream,
            other => Error::SourceStream(other.to_string()),
        });
    }

    let keep = status.is_ok() && meta.file_size > 0;
    match staged {
        Some(table) if keep => {
            table.commit();
            log::info!(
                "Table {} committed: {} entries, {} bytes",
                meta.number,
                meta.entries,
                meta.file_size
            );
        }
        Some(table) => {
            ctx.table_cache.evict(meta.number);
            table.discard();
        }
        None => remove_if_present(ctx.env.as_ref(), &path),
    }
    if !keep {
        meta.file_size = 0;
    }
    if let Err(e) = &status {
        log::error!("Building table {} failed: {}", meta.number, e);
    }
    status
}

/// Feeds surviving records into the table writer and remembers the last
/// key written.
struct TableSink<'b, 'a> {
    builder: &'b mut TableBuilder<'a>,
    last_key: Vec<u8>,
}

impl RecordSink for TableSink<'_, '_> {
    fn emit(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.builder.add(key, value)?;
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        Ok(())
    }
}

/// Everything between opening the file and deciding to keep it.
/// `iter` is positioned on its first record.
fn write_and_verify(
    ctx: &BuildContext,
    mut file: Box<dyn WritableFile>,
    iter: &mut dyn StorageIterator,
    meta: &mut FileMetaData,
    purge: bool,
    window: VisibilityWindow,
) -> Result<()> {
    meta.smallest = decode_key(iter.key())?;

    let mut builder = TableBuilder::new(&ctx.options, ctx.internal_comparator(), file.as_mut());
    let mut sink = TableSink {
        builder: &mut builder,
        last_key: Vec::new(),
    };
    let emitted = if purge {
        elision::keep_newest_versions(
            iter,
            ctx.user_comparator.as_ref(),
            window.earliest_in_source,
            &mut sink,
        )
    } else {
        elision::copy_all(iter, &mut sink)
    };
    let last_key = sink.last_key;

    let file_size = match emitted {
        Ok(entries) => {
            meta.entries = entries;
            match builder.finish()? {
                TableOutcome::Finished { file_size } => file_size,
                TableOutcome::Abandoned => {
                    return Err(Error::Integrity("finish abandoned the table".into()));
                }
            }
        }
        Err(e) => {
            let outcome = builder.abandon();
            log::debug!("Table {}: writer {:?} after {}", meta.number, outcome, e);
            return Err(e);
        }
    };

    meta.largest = decode_key(&last_key)?;
    meta.file_size = file_size;
    if file_size == 0 {
        return Err(Error::Integrity(format!(
            "table {} finished with zero bytes from a non-empty stream",
            meta.number
        )));
    }

    if ctx.options.sync_on_finish() {
        let synced = if ctx.options.use_strict_sync() {
            file.fsync()
        } else {
            file.sync()
        };
        synced.map_err(|e| Error::SyncFailed(e.to_string()))?;
    }
    file.close()
        .map_err(|e| Error::CloseFailed(e.to_string()))?;

    verify(ctx, meta)
}

/// Read the finished table back through the table cache.
fn verify(ctx: &BuildContext, meta: &FileMetaData) -> Result<()> {
    let failed = |reason: String| {
        log::error!("Table {} failed verification: {}", meta.number, reason);
        Error::VerificationFailed {
            file_id: meta.number,
            reason,
        }
    };

    // A table cached under this number belongs to an earlier file.
    ctx.table_cache.evict(meta.number);
    let table = ctx
        .table_cache
        .open_for_read(meta.number, meta.file_size)
        .map_err(|e| failed(e.to_string()))?;
    if table.entry_count() != meta.entries {
        return Err(failed(format!(
            "footer records {} entries, {} were written",
            table.entry_count(),
            meta.entries
        )));
    }

    let mut iter = table.iter();
    iter.seek_to_first();
    iter.status().map_err(|e| failed(e.to_string()))
}

fn decode_key(key: &[u8]) -> Result<InternalKey> {
    InternalKey::decode(key)
        .map_err(|e| Error::Integrity(format!("malformed key in source stream: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MemEnv;
    use crate::error::ErrorKind;
    use crate::iterator::VecIterator;
    use crate::options::SyncMode;
    use crate::types::ValueType;

    fn context(env: &MemEnv, options: Options) -> BuildContext {
        BuildContext::new("/db", Arc::new(env.clone()), options)
    }

    fn records() -> VecIterator {
        VecIterator::from_records(
            vec![
                ("k1", 5, ValueType::Put, "A"),
                ("k1", 3, ValueType::Put, "B"),
                ("k2", 4, ValueType::Put, "C"),
            ],
            InternalKeyComparator::default(),
        )
    }

    fn read_back(ctx: &BuildContext, meta: &FileMetaData) -> Vec<(InternalKey, Vec<u8>)> {
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
        out
    }

    #[test]
    fn window_gate() {
        assert!(VisibilityWindow::new(2, 3).permits_elision());
        assert!(!VisibilityWindow::new(3, 3).permits_elision());
        assert!(!VisibilityWindow::new(4, 3).permits_elision());
    }

    #[test]
    fn elision_keeps_newest_version_per_key() {
        let env = MemEnv::new();
        let ctx = context(&env, Options::default().with_purge_redundant(true));
        let mut meta = FileMetaData::new(7);

        build_table(&ctx, &mut records(), &mut meta, VisibilityWindow::new(2, 3)).unwrap();

        assert!(meta.has_table());
        assert_eq!(meta.entries, 2);
        assert_eq!(meta.smallest, InternalKey::new("k1", 5, ValueType::Put));
        assert_eq!(meta.largest, InternalKey::new("k2", 4, ValueType::Put));
        let got: Vec<_> = read_back(&ctx, &meta)
            .into_iter()
            .map(|(k, v)| (k.user_key, v))
            .collect();
        assert_eq!(
            got,
            vec![(b"k1".to_vec(), b"A".to_vec()), (b"k2".to_vec(), b"C".to_vec())]
        );
    }

    #[test]
    fn live_snapshot_disables_elision() {
        let env = MemEnv::new();
        let ctx = context(&env, Options::default().with_purge_redundant(true));
        let mut meta = FileMetaData::new(8);

        build_table(&ctx, &mut records(), &mut meta, VisibilityWindow::new(4, 3)).unwrap();

        assert_eq!(meta.entries, 3);
        let seqs: Vec<_> = read_back(&ctx, &meta)
            .into_iter()
            .map(|(k, _)| k.sequence)
            .collect();
        assert_eq!(seqs, vec![5, 3, 4]);
        assert_eq!(meta.largest, InternalKey::new("k2", 4, ValueType::Put));
        assert_eq!(
            env.file_size(&ctx.table_path(8)).unwrap(),
            meta.file_size
        );
    }

    #[test]
    fn empty_stream_creates_nothing() {
        let env = MemEnv::new();
        let ctx = context(&env, Options::default());
        let mut meta = FileMetaData::new(1);
        let mut iter = VecIterator::new(Vec::new(), InternalKeyComparator::default());

        build_table(&ctx, &mut iter, &mut meta, VisibilityWindow::new(0, 0)).unwrap();

        assert_eq!(meta.file_size, 0);
        assert!(!meta.has_table());
        assert_eq!(env.file_count(), 0);
    }

    #[test]
    fn sync_mode_picks_the_primitive() {
        for (mode, expected) in [
            (SyncMode::None, (0, 0)),
            (SyncMode::Fdatasync, (1, 0)),
            (SyncMode::Fsync, (0, 1)),
        ] {
            let env = MemEnv::new();
            let ctx = context(&env, Options::default().with_sync_mode(mode));
            let mut meta = FileMetaData::new(3);
            build_table(&ctx, &mut records(), &mut meta, VisibilityWindow::new(0, 3)).unwrap();

            let path = ctx.table_path(3);
            assert_eq!(env.sync_counts(&path), Some(expected), "{mode:?}");
            assert_eq!(env.is_closed(&path), Some(true));
        }
    }

    #[test]
    fn broken_sequence_order_leaves_no_file() {
        let env = MemEnv::new();
        let ctx = context(&env, Options::default().with_purge_redundant(true));
        let mut meta = FileMetaData::new(4);
        let entries = vec![
            (InternalKey::new("k", 2, ValueType::Put).encode(), b"old".to_vec()),
            (InternalKey::new("k", 6, ValueType::Put).encode(), b"new".to_vec()),
        ];
        let mut iter = VecIterator::new(entries, InternalKeyComparator::default());

        let err = build_table(&ctx, &mut iter, &mut meta, VisibilityWindow::new(1, 2)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
        assert_eq!(meta.file_size, 0);
        assert!(!env.file_exists(&ctx.table_path(4)));
        assert!(!ctx.table_cache.contains(4));
    }
}
