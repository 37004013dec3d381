//! Incident data model shared by the stream engine, views and dashboard.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a fleet incident
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentType {
    Traffic,
    Breakdown,
    Weather,
    Behavior,
}

impl IncidentType {
    pub const ALL: [IncidentType; 4] = [
        IncidentType::Traffic,
        IncidentType::Breakdown,
        IncidentType::Weather,
        IncidentType::Behavior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::Traffic => "traffic",
            IncidentType::Breakdown => "breakdown",
            IncidentType::Weather => "weather",
            IncidentType::Behavior => "behavior",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trip state at the time an incident is reported
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    EnRoute,
    Delayed,
    AtRisk,
}

/// A vehicle/driver assignment that incidents attach to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub vehicle_name: String,
    pub driver_name: String,
    pub status: TripStatus,
}

/// A simulated fleet event requiring attention
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub trip_id: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub description: String,
    pub location_lat: f64,
    pub location_lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
}

/// Structured assessment attached to an incident
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    pub incident_id: String,
    pub explanation: String,
    pub recommendation: String,
    /// Signed magnitude, e.g. "+5kg", "-2kg", "0kg"
    pub impact_co2: String,
    /// Signed magnitude, e.g. "+20min", "+1h30", "0min"
    pub impact_time: String,
    pub created_at: DateTime<Utc>,
}

impl Analysis {
    pub fn new(
        incident_id: impl Into<String>,
        explanation: impl Into<String>,
        recommendation: impl Into<String>,
        impact_co2: impl Into<String>,
        impact_time: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("analysis-{}", generate_id()),
            incident_id: incident_id.into(),
            explanation: explanation.into(),
            recommendation: recommendation.into(),
            impact_co2: impact_co2.into(),
            impact_time: impact_time.into(),
            created_at: Utc::now(),
        }
    }
}

/// Incident as published to consumers: pending until `analysis` is attached
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentWithAnalysis {
    #[serde(flatten)]
    pub incident: Incident,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

impl IncidentWithAnalysis {
    pub fn pending(incident: Incident) -> Self {
        Self {
            incident,
            analysis: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.incident.id
    }

    pub fn is_analyzed(&self) -> bool {
        self.analysis.is_some()
    }
}

impl From<Incident> for IncidentWithAnalysis {
    fn from(incident: Incident) -> Self {
        Self::pending(incident)
    }
}

/// Lifecycle position of a single incident inside the stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentPhase {
    /// Published, analysis not yet attached
    Pending,
    /// Analysis attached and inside the highlight window
    Analyzed,
    /// Analysis attached, highlight window elapsed
    Settled,
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<unix-millis>-<7 base36 chars>`
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}
