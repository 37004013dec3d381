// Fleet Core Library
// Simulated fleet-incident stream with asynchronous analysis enrichment

pub mod analysis;
pub mod dashboard;
pub mod export;
pub mod incident;
pub mod shortcuts;
pub mod storage;
pub mod stream;
pub mod views;

// Export core types
pub use analysis::{analyze_or_fallback, fallback_analysis, AnalysisProvider};
pub use incident::{
    Analysis, GeoBounds, Incident, IncidentFactory, IncidentPhase, IncidentType,
    IncidentWithAnalysis,
};
pub use storage::{IncidentRepository, InMemoryKvStore, KvStore, RocksDbStore};
pub use stream::{CycleOutcome, IncidentStream, StreamConfig, StreamEvent};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Analysis error: {0}")]
    AnalysisError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, FleetError>;
