//! Incident stream engine
//!
//! A recurring loop generates an incident, publishes it in pending state,
//! enriches it through an [`AnalysisProvider`](crate::analysis::AnalysisProvider)
//! and flags it "new" for a fixed highlight window.
//!
//! Cycles never overlap: a tick that fires while a cycle is in flight is
//! dropped. The merge step looks the incident up by id, so a `clear()` that
//! lands while the provider is still working turns the merge into a no-op.

mod config;
mod engine;
mod event;

pub use config::StreamConfig;
pub use engine::{CycleOutcome, IncidentStream};
pub use event::{StreamBroadcaster, StreamEvent};
