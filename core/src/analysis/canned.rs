use super::AnalysisProvider;
use crate::incident::{Analysis, Incident, IncidentType};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Offline provider returning a fixed analysis per incident category.
///
/// Useful when no LLM backend is reachable; `latency` simulates the round trip.
#[derive(Debug, Clone, Default)]
pub struct CannedAnalysisProvider {
    latency: Duration,
}

impl CannedAnalysisProvider {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl AnalysisProvider for CannedAnalysisProvider {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn analyze(&self, incident: &Incident) -> Result<Analysis> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let (explanation, recommendation, co2, time) = match incident.incident_type {
            IncidentType::Traffic => (
                "Congestion sur l'itinéraire prévu, probablement liée à un incident ou des travaux.",
                "Proposer un itinéraire alternatif au chauffeur.",
                "+4kg",
                "+25min",
            ),
            IncidentType::Breakdown => (
                "Défaillance mécanique signalée par la télémétrie du véhicule.",
                "Immobiliser le véhicule et contacter l'assistance dépannage.",
                "+8kg",
                "+1h30",
            ),
            IncidentType::Weather => (
                "Conditions météorologiques dégradées sur la zone du trajet.",
                "Réduire la vitesse et augmenter les distances de sécurité.",
                "+2kg",
                "+20min",
            ),
            IncidentType::Behavior => (
                "Style de conduite hors des seuils définis pour la flotte.",
                "Rappeler au chauffeur les consignes d'éco-conduite.",
                "-1kg",
                "0min",
            ),
        };
        Ok(Analysis::new(&incident.id, explanation, recommendation, co2, time))
    }
}
