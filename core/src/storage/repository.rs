use super::KvStore;
use crate::incident::IncidentWithAnalysis;
use crate::Result;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SLOT: &str = "incidents";

/// Reads and writes the whole incident collection under a single slot
#[derive(Clone)]
pub struct IncidentRepository {
    store: Arc<dyn KvStore>,
    slot: String,
}

impl IncidentRepository {
    pub fn new(store: Arc<dyn KvStore>, slot: impl Into<String>) -> Self {
        Self {
            store,
            slot: slot.into(),
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Stored collection, or empty when the slot was never written
    pub fn load(&self) -> Result<Vec<IncidentWithAnalysis>> {
        match self.store.get(&self.slot)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save(&self, incidents: &[IncidentWithAnalysis]) -> Result<()> {
        let bytes = serde_json::to_vec(incidents)?;
        debug!(target: "storage", slot = %self.slot, count = incidents.len(), "Persisting incidents");
        self.store.put(&self.slot, &bytes)
    }
}
