//! Key-value persistence for the incident collection
//!
//! - `KvStore` - byte-level get/put/delete by key
//! - `RocksDbStore` - durable backend, survives restarts
//! - `InMemoryKvStore` - process-wide backend for tests and ephemeral runs
//! - `IncidentRepository` - JSON snapshot of the collection under one named slot

mod memory;
mod repository;
mod rocks;

pub use memory::InMemoryKvStore;
pub use repository::{IncidentRepository, DEFAULT_SLOT};
pub use rocks::RocksDbStore;

use crate::Result;

/// Minimal key-value persistence layer
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}
