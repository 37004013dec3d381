//! Incident model and mock generation

mod factory;
mod types;

pub use factory::{templates, GeoBounds, IncidentFactory};
pub use types::{
    generate_id, Analysis, Incident, IncidentPhase, IncidentType, IncidentWithAnalysis, Trip,
    TripStatus,
};
