use super::client::LlmClient;
use super::AnalysisProvider;
use crate::incident::{Analysis, Incident, IncidentType};
use crate::{FleetError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_EXPLANATION: &str = "Analyse en cours...";
const DEFAULT_RECOMMENDATION: &str = "Recommandation en attente...";
const DEFAULT_IMPACT_CO2: &str = "0kg";
const DEFAULT_IMPACT_TIME: &str = "0min";

fn prompt_label(incident_type: IncidentType) -> &'static str {
    match incident_type {
        IncidentType::Traffic => "trafic",
        IncidentType::Breakdown => "panne mécanique",
        IncidentType::Weather => "conditions météorologiques",
        IncidentType::Behavior => "comportement du conducteur",
    }
}

/// Supervisor prompt asking for the four-field JSON object
pub fn build_prompt(incident: &Incident) -> String {
    format!(
        "Tu es un superviseur logistique expert. Un incident de type \"{label}\" est rapporté: \"{description}\".\n\
         \n\
         Génère une analyse structurée avec:\n\
         - explanation: Une courte explication des causes probables (1-2 phrases, français)\n\
         - recommendation: Une recommandation claire et actionnable pour le chauffeur ou l'opérateur (1 phrase, français)\n\
         - impactCo2: Estimation de l'impact CO2 (format: \"+5kg\" ou \"-2kg\" ou \"0kg\")\n\
         - impactTime: Estimation de l'impact temps (format: \"+20min\" ou \"+1h30\" ou \"0min\")\n\
         \n\
         Réponds en JSON avec exactement ces 4 propriétés. Sois concis et professionnel.",
        label = prompt_label(incident.incident_type),
        description = incident.description,
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    impact_co2: Option<String>,
    #[serde(default)]
    impact_time: Option<String>,
}

fn non_empty(v: Option<String>, default: &str) -> String {
    v.filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Turn the model's text into an [`Analysis`] for `incident`.
///
/// Missing or empty fields take per-field defaults; text that is not a JSON
/// object is an error.
pub fn parse_analysis_response(incident: &Incident, text: &str) -> Result<Analysis> {
    let body = strip_code_fence(text);
    let raw: RawAnalysis = serde_json::from_str(body)
        .map_err(|e| FleetError::AnalysisError(format!("Malformed analysis JSON: {e}")))?;

    Ok(Analysis::new(
        &incident.id,
        non_empty(raw.explanation, DEFAULT_EXPLANATION),
        non_empty(raw.recommendation, DEFAULT_RECOMMENDATION),
        non_empty(raw.impact_co2, DEFAULT_IMPACT_CO2),
        non_empty(raw.impact_time, DEFAULT_IMPACT_TIME),
    ))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Analysis provider backed by an OpenAI-compatible LLM
pub struct LlmAnalysisProvider {
    client: Arc<LlmClient>,
}

impl LlmAnalysisProvider {
    pub fn new(client: Option<LlmClient>) -> Result<Self> {
        let c = match client {
            Some(c) => c,
            None => LlmClient::from_env()?,
        };
        Ok(Self {
            client: Arc::new(c),
        })
    }
}

#[async_trait]
impl AnalysisProvider for LlmAnalysisProvider {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn analyze(&self, incident: &Incident) -> Result<Analysis> {
        let prompt = build_prompt(incident);
        debug!(
            target: "analysis",
            incident_id = %incident.id,
            model = %self.client.config().model,
            "Requesting incident analysis"
        );
        let text = self.client.complete_json(&prompt).await?;
        parse_analysis_response(incident, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn incident(incident_type: IncidentType) -> Incident {
        Incident {
            id: "inc-1".to_string(),
            created_at: Utc::now(),
            trip_id: "trip-1".to_string(),
            incident_type,
            description: "Niveau huile critique détecté".to_string(),
            location_lat: 46.0,
            location_lng: 3.0,
            vehicle_name: None,
            driver_name: None,
        }
    }

    #[test]
    fn prompt_names_label_and_description() {
        let prompt = build_prompt(&incident(IncidentType::Breakdown));
        assert!(prompt.contains("\"panne mécanique\""));
        assert!(prompt.contains("\"Niveau huile critique détecté\""));
        assert!(prompt.contains("impactCo2"));
        assert!(prompt.contains("impactTime"));
    }

    #[test]
    fn parses_complete_response() {
        let text = r#"{"explanation":"Usure","recommendation":"Arrêt immédiat","impactCo2":"+5kg","impactTime":"+45min"}"#;
        let a = parse_analysis_response(&incident(IncidentType::Breakdown), text).unwrap();
        assert_eq!(a.incident_id, "inc-1");
        assert_eq!(a.explanation, "Usure");
        assert_eq!(a.recommendation, "Arrêt immédiat");
        assert_eq!(a.impact_co2, "+5kg");
        assert_eq!(a.impact_time, "+45min");
        assert!(a.id.starts_with("analysis-"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let text = r#"{"explanation":"","impactCo2":"-2kg"}"#;
        let a = parse_analysis_response(&incident(IncidentType::Traffic), text).unwrap();
        assert_eq!(a.explanation, DEFAULT_EXPLANATION);
        assert_eq!(a.recommendation, DEFAULT_RECOMMENDATION);
        assert_eq!(a.impact_co2, "-2kg");
        assert_eq!(a.impact_time, DEFAULT_IMPACT_TIME);
    }

    #[test]
    fn fenced_json_is_accepted() {
        let text = "```json\n{\"explanation\":\"x\",\"recommendation\":\"y\",\"impactCo2\":\"0kg\",\"impactTime\":\"0min\"}\n```";
        let a = parse_analysis_response(&incident(IncidentType::Weather), text).unwrap();
        assert_eq!(a.explanation, "x");
    }

    #[test]
    fn non_json_is_an_error() {
        let err = parse_analysis_response(&incident(IncidentType::Weather), "désolé").unwrap_err();
        assert!(matches!(err, FleetError::AnalysisError(_)));
    }
}
