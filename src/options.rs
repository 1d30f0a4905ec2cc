/// How the finished table file is pushed to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Leave it to the OS page cache. Fastest, not crash-safe.
    None,
    /// Best-effort data sync (`fdatasync`-like: file data, not all metadata).
    #[default]
    Fdatasync,
    /// Strict sync (`fsync`-like: data and metadata reach the device).
    Fsync,
}

/// Caller-supplied policy for table builds.
///
/// `purge_redundant` is advisory: a build turns it off on its own when a
/// live snapshot could still need an older version.
#[derive(Debug, Clone)]
pub struct Options {
    /// Collapse multiple versions of a user key to the newest one.
    pub purge_redundant: bool,
    pub sync_mode: SyncMode,
    /// Target size of an uncompressed data block.
    pub block_size: usize,
    /// Target false positive rate of the per-table bloom filter.
    pub bloom_false_positive_rate: f64,
    /// Open tables kept by the table cache.
    pub table_cache_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            purge_redundant: false,
            sync_mode: SyncMode::default(),
            block_size: 4096,
            bloom_false_positive_rate: 0.01,
            table_cache_capacity: 64,
        }
    }
}

impl Options {
    pub fn with_purge_redundant(mut self, purge: bool) -> Self {
        self.purge_redundant = purge;
        self
    }

    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.bloom_false_positive_rate = rate;
        self
    }

    pub fn with_table_cache_capacity(mut self, capacity: usize) -> Self {
        self.table_cache_capacity = capacity;
        self
    }

    /// Whether a finished table is synced at all.
    pub fn sync_on_finish(&self) -> bool {
        self.sync_mode != SyncMode::None
    }

    /// Whether the strict (hardware flush) primitive is used.
    pub fn use_strict_sync(&self) -> bool {
        self.sync_mode == SyncMode::Fsync
    }
}
