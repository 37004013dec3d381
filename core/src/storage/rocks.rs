use super::KvStore;
use crate::{FleetError, Result};
use rocksdb::{Options, DB};
use std::path::Path;
use tracing::info;

/// Persistent storage using RocksDB
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| FleetError::StorageError(e.to_string()))?;

        info!(target: "storage", path = %path.as_ref().display(), "RocksDB storage opened");
        Ok(Self { db })
    }
}

impl KvStore for RocksDbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| FleetError::StorageError(e.to_string()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .map_err(|e| FleetError::StorageError(e.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.db
            .delete(key)
            .map_err(|e| FleetError::StorageError(e.to_string()))
    }
}
