use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::comparator::InternalKeyComparator;
use crate::env::Env;
use crate::error::Result;
use crate::filename::table_file_name;
use crate::sstable::{Table, TableIterator};

/// Keeps recently opened tables so repeated reads skip the footer, index
/// and filter parsing.
///
/// Eviction is FIFO by open time once `capacity` tables are held. Safe to
/// share between threads; a table is opened outside the lock, so two
/// threads racing on the same cold file may both open it and the later
/// insert wins.
pub struct TableCache {
    dbname: PathBuf,
    env: Arc<dyn Env>,
    comparator: InternalKeyComparator,
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    tables: HashMap<u64, Arc<Table>>,
    order: VecDeque<u64>,
}

impl TableCache {
    pub fn new(
        dbname: impl Into<PathBuf>,
        env: Arc<dyn Env>,
        comparator: InternalKeyComparator,
        capacity: usize,
    ) -> Self {
        TableCache {
            dbname: dbname.into(),
            env,
            comparator,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn dbname(&self) -> &Path {
        &self.dbname
    }

    /// Open table `file_id`, which must be exactly `file_size` bytes.
    pub fn open_for_read(&self, file_id: u64, file_size: u64) -> Result<Arc<Table>> {
        if let Some(table) = self.state.lock().tables.get(&file_id) {
            return Ok(Arc::clone(table));
        }

        let path = table_file_name(&self.dbname, file_id);
        let file = self.env.new_random_access_file(&path)?;
        let table = Arc::new(Table::open(file, file_size, self.comparator.clone())?);

        let mut state = self.state.lock();
        if state.tables.insert(file_id, Arc::clone(&table)).is_none() {
            state.order.push_back(file_id);
        }
        while state.tables.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.tables.remove(&oldest);
        }
        Ok(table)
    }

    /// A fresh, unpositioned iterator over table `file_id`.
    pub fn new_iterator(&self, file_id: u64, file_size: u64) -> Result<TableIterator> {
        Ok(self.open_for_read(file_id, file_size)?.iter())
    }

    /// Forget a table, e.g. after its file was deleted.
    pub fn evict(&self, file_id: u64) {
        let mut state = self.state.lock();
        if state.tables.remove(&file_id).is_some() {
            state.order.retain(|id| *id != file_id);
        }
    }

    pub fn contains(&self, file_id: u64) -> bool {
        self.state.lock().tables.contains_key(&file_id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
