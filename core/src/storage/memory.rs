use super::KvStore;
use crate::Result;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory key-value store.
///
/// Share one instance through `Arc` to get process-wide semantics.
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryKvStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
