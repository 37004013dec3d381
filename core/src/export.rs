//! CSV export of the incident collection

use crate::incident::IncidentWithAnalysis;
use chrono::{DateTime, Local, Utc};

pub const CSV_HEADER: [&str; 9] = [
    "Date",
    "Type",
    "Description",
    "Vehicle",
    "Driver",
    "Explanation",
    "Recommendation",
    "CO2 Impact",
    "Time Impact",
];

const PENDING_EXPLANATION: &str = "En attente d'analyse";
const PENDING_RECOMMENDATION: &str = "En attente";
const MISSING_IMPACT: &str = "N/A";

/// fr-FR style `dd/mm/yyyy hh:mm:ss`
pub fn format_date(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d/%m/%Y %H:%M:%S")
        .to_string()
}

/// Serialize the collection, one row per incident after the header row.
/// An empty collection produces the header only.
pub fn to_csv(incidents: &[IncidentWithAnalysis]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().copied());

    for item in incidents {
        let incident = &item.incident;
        let analysis = item.analysis.as_ref();
        let date = format_date(&incident.created_at);
        push_row(
            &mut out,
            [
                date.as_str(),
                incident.incident_type.as_str(),
                incident.description.as_str(),
                incident.vehicle_name.as_deref().unwrap_or_default(),
                incident.driver_name.as_deref().unwrap_or_default(),
                analysis.map_or(PENDING_EXPLANATION, |a| a.explanation.as_str()),
                analysis.map_or(PENDING_RECOMMENDATION, |a| a.recommendation.as_str()),
                analysis.map_or(MISSING_IMPACT, |a| a.impact_co2.as_str()),
                analysis.map_or(MISSING_IMPACT, |a| a.impact_time.as_str()),
            ],
        );
    }
    out
}

/// `incidents-YYYY-MM-DD.csv`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("incidents-{}.csv", now.format("%Y-%m-%d"))
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
