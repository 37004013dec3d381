//! Analysis module: provider contract, fallback policy and implementations
//!
//! This module provides:
//! - `AnalysisProvider` trait the stream engine calls once per incident
//! - `fallback_analysis` / `analyze_or_fallback` so provider failures never reach the stream
//! - `LlmClient` + `LlmAnalysisProvider` for OpenAI-compatible backends
//! - `CannedAnalysisProvider` for offline runs

mod canned;
mod client;
mod llm;

pub use canned::CannedAnalysisProvider;
pub use client::{LlmClient, LlmClientConfig};
pub use llm::{build_prompt, parse_analysis_response, LlmAnalysisProvider};

use crate::incident::{Analysis, Incident};
use crate::Result;
use async_trait::async_trait;
use tracing::warn;

pub const FALLBACK_EXPLANATION: &str =
    "L'analyse automatique a rencontré une difficulté. Veuillez vérifier manuellement.";
pub const FALLBACK_RECOMMENDATION: &str = "Contacter le chauffeur pour obtenir plus d'informations.";
pub const FALLBACK_IMPACT_CO2: &str = "0kg";
pub const FALLBACK_IMPACT_TIME: &str = "+10min";

/// Produces a structured analysis for an incident. May fail.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    async fn analyze(&self, incident: &Incident) -> Result<Analysis>;
}

/// Canned result substituted when a provider fails
pub fn fallback_analysis(incident: &Incident) -> Analysis {
    Analysis::new(
        &incident.id,
        FALLBACK_EXPLANATION,
        FALLBACK_RECOMMENDATION,
        FALLBACK_IMPACT_CO2,
        FALLBACK_IMPACT_TIME,
    )
}

/// Calls the provider and swaps any error for [`fallback_analysis`]
pub async fn analyze_or_fallback(provider: &dyn AnalysisProvider, incident: &Incident) -> Analysis {
    match provider.analyze(incident).await {
        Ok(mut analysis) => {
            // The foreign key always points at the incident we asked about
            analysis.incident_id = incident.id.clone();
            analysis
        }
        Err(e) => {
            warn!(
                target: "analysis",
                provider = provider.name(),
                incident_id = %incident.id,
                error = %e,
                "Analysis failed; using fallback"
            );
            fallback_analysis(incident)
        }
    }
}
