//! Derived views over the incident collection.
//!
//! Everything here is a pure function of its input, recomputed on every read.

use crate::incident::{IncidentType, IncidentWithAnalysis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type filter; `All` passes everything through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentFilter {
    #[default]
    All,
    #[serde(untagged)]
    Type(IncidentType),
}

impl IncidentFilter {
    pub fn parse(s: &str) -> Option<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Some(IncidentFilter::All);
        }
        IncidentType::parse(s).map(IncidentFilter::Type)
    }

    pub fn matches(&self, item: &IncidentWithAnalysis) -> bool {
        match self {
            IncidentFilter::All => true,
            IncidentFilter::Type(t) => item.incident.incident_type == *t,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "desc" => Some(SortOrder::Newest),
            "oldest" | "asc" => Some(SortOrder::Oldest),
            _ => None,
        }
    }
}

pub fn filter_by_type(
    incidents: &[IncidentWithAnalysis],
    filter: IncidentFilter,
) -> Vec<IncidentWithAnalysis> {
    incidents
        .iter()
        .filter(|i| filter.matches(i))
        .cloned()
        .collect()
}

/// Stable sort on `createdAt`; ties keep their collection order
pub fn sort_by_timestamp(
    incidents: &[IncidentWithAnalysis],
    order: SortOrder,
) -> Vec<IncidentWithAnalysis> {
    let mut sorted = incidents.to_vec();
    match order {
        SortOrder::Newest => sorted.sort_by(|a, b| b.incident.created_at.cmp(&a.incident.created_at)),
        SortOrder::Oldest => sorted.sort_by(|a, b| a.incident.created_at.cmp(&b.incident.created_at)),
    }
    sorted
}

/// Filter and sort selection held by a dashboard
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    pub filter: IncidentFilter,
    pub sort: SortOrder,
}

impl ViewQuery {
    pub fn apply(&self, incidents: &[IncidentWithAnalysis]) -> Vec<IncidentWithAnalysis> {
        sort_by_timestamp(&filter_by_type(incidents, self.filter), self.sort)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Aggregates shown in the stats overview
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentStats {
    pub total: usize,
    pub analyzed: usize,
    pub pending: usize,
    /// Breakdowns
    pub critical: usize,
    pub by_type: BTreeMap<String, usize>,
    /// Summed kg across analyzed incidents
    pub co2_total: i64,
    /// Summed minutes (leading integer only) across analyzed incidents
    pub time_total: i64,
}

impl IncidentStats {
    pub fn co2_display(&self) -> String {
        format_signed(self.co2_total, "kg")
    }

    pub fn time_display(&self) -> String {
        format_signed(self.time_total, "min")
    }
}

pub fn compute_stats(incidents: &[IncidentWithAnalysis]) -> IncidentStats {
    let mut stats = IncidentStats {
        by_type: IncidentType::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect(),
        ..Default::default()
    };
    for item in incidents {
        stats.total += 1;
        *stats
            .by_type
            .entry(item.incident.incident_type.as_str().to_string())
            .or_default() += 1;
        if item.incident.incident_type == IncidentType::Breakdown {
            stats.critical += 1;
        }
        match &item.analysis {
            Some(analysis) => {
                stats.analyzed += 1;
                // Impact strings come from the model; clamp instead of overflowing
                stats.co2_total = stats
                    .co2_total
                    .saturating_add(parse_impact(&analysis.impact_co2));
                stats.time_total = stats
                    .time_total
                    .saturating_add(parse_impact(&analysis.impact_time));
            }
            None => stats.pending += 1,
        }
    }
    stats
}

/// First signed integer in `value` (`[+-]?\d+`), or 0 when there is none.
///
/// "+1h30" yields 1: only the leading run of digits counts.
pub fn parse_impact(value: &str) -> i64 {
    let bytes = value.as_bytes();
    let Some(start) = bytes.iter().position(u8::is_ascii_digit) else {
        return 0;
    };
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |n| start + n);
    let magnitude: i64 = value[start..end].parse().unwrap_or(i64::MAX);
    if start > 0 && bytes[start - 1] == b'-' {
        -magnitude
    } else {
        magnitude
    }
}

/// "+3kg", "-2kg", "0kg"
pub fn format_signed(total: i64, unit: &str) -> String {
    if total > 0 {
        format!("+{total}{unit}")
    } else {
        format!("{total}{unit}")
    }
}

/// Direction of an impact estimate, from its sign prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactTrend {
    Increase,
    Decrease,
    Neutral,
}

pub fn impact_trend(value: &str) -> ImpactTrend {
    match value.trim_start().as_bytes().first() {
        Some(b'+') => ImpactTrend::Increase,
        Some(b'-') => ImpactTrend::Decrease,
        _ => ImpactTrend::Neutral,
    }
}

/// Split into (analyzed, pending), both in collection order
pub fn partition_feed(
    incidents: &[IncidentWithAnalysis],
) -> (Vec<IncidentWithAnalysis>, Vec<IncidentWithAnalysis>) {
    incidents.iter().cloned().partition(|i| i.is_analyzed())
}

pub fn type_label(incident_type: IncidentType) -> &'static str {
    match incident_type {
        IncidentType::Traffic => "Trafic",
        IncidentType::Breakdown => "Panne",
        IncidentType::Weather => "Météo",
        IncidentType::Behavior => "Comportement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{Analysis, Incident};
    use chrono::{Duration, TimeZone, Utc};

    fn item(id: &str, t: IncidentType, minute: i64, impact: Option<(&str, &str)>) -> IncidentWithAnalysis {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minute);
        IncidentWithAnalysis {
            incident: Incident {
                id: id.to_string(),
                created_at,
                trip_id: "trip".to_string(),
                incident_type: t,
                description: "desc".to_string(),
                location_lat: 45.0,
                location_lng: 1.0,
                vehicle_name: None,
                driver_name: None,
            },
            analysis: impact.map(|(co2, time)| Analysis::new(id, "e", "r", co2, time)),
        }
    }

    #[test]
    fn impact_totals_sum_signed_values() {
        let incidents = vec![
            item("a", IncidentType::Traffic, 0, Some(("+5kg", "+20min"))),
            item("b", IncidentType::Weather, 1, Some(("-2kg", "0min"))),
            item("c", IncidentType::Behavior, 2, Some(("0kg", "-5min"))),
        ];
        let stats = compute_stats(&incidents);
        assert_eq!(stats.co2_total, 3);
        assert_eq!(stats.time_total, 15);
        assert_eq!(stats.co2_display(), "+3kg");
    }

    #[test]
    fn oversized_impacts_saturate_instead_of_overflowing() {
        let incidents = vec![
            item("a", IncidentType::Traffic, 0, Some(("+99999999999999999999kg", "+20min"))),
            item("b", IncidentType::Traffic, 1, Some(("+5kg", "+99999999999999999999min"))),
            item("c", IncidentType::Traffic, 2, Some(("+5kg", "+5min"))),
        ];
        let stats = compute_stats(&incidents);
        assert_eq!(stats.co2_total, i64::MAX);
        assert_eq!(stats.time_total, i64::MAX);

        let negative = vec![
            item("a", IncidentType::Weather, 0, Some(("-99999999999999999999kg", "0min"))),
            item("b", IncidentType::Weather, 1, Some(("-99999999999999999999kg", "0min"))),
        ];
        assert_eq!(compute_stats(&negative).co2_total, i64::MIN);
    }

    #[test]
    fn parse_impact_handles_odd_inputs() {
        assert_eq!(parse_impact("+1h30"), 1);
        assert_eq!(parse_impact("-12min"), -12);
        assert_eq!(parse_impact("N/A"), 0);
        assert_eq!(parse_impact(""), 0);
        assert_eq!(parse_impact("environ 7kg"), 7);
    }

    #[test]
    fn stats_count_pending_and_critical() {
        let incidents = vec![
            item("a", IncidentType::Breakdown, 0, None),
            item("b", IncidentType::Breakdown, 1, Some(("+1kg", "+1min"))),
            item("c", IncidentType::Traffic, 2, None),
        ];
        let stats = compute_stats(&incidents);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.analyzed, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.critical, 2);
        assert_eq!(stats.by_type["breakdown"], 2);
        assert_eq!(stats.by_type["weather"], 0);
        assert_eq!(stats.co2_total, 1);
    }

    #[test]
    fn filter_all_passes_through() {
        let incidents = vec![
            item("a", IncidentType::Traffic, 0, None),
            item("b", IncidentType::Weather, 1, None),
        ];
        assert_eq!(filter_by_type(&incidents, IncidentFilter::All), incidents);
        let weather = filter_by_type(&incidents, IncidentFilter::Type(IncidentType::Weather));
        assert_eq!(weather.len(), 1);
        assert_eq!(weather[0].id(), "b");
    }

    #[test]
    fn sort_is_stable_in_both_directions() {
        let incidents = vec![
            item("a", IncidentType::Traffic, 5, None),
            item("b", IncidentType::Traffic, 1, None),
            item("c", IncidentType::Traffic, 5, None),
        ];
        let newest: Vec<_> = sort_by_timestamp(&incidents, SortOrder::Newest)
            .into_iter()
            .map(|i| i.incident.id)
            .collect();
        assert_eq!(newest, ["a", "c", "b"]);
        let oldest: Vec<_> = sort_by_timestamp(&incidents, SortOrder::Oldest)
            .into_iter()
            .map(|i| i.incident.id)
            .collect();
        assert_eq!(oldest, ["b", "a", "c"]);
    }

    #[test]
    fn view_query_resets_to_defaults() {
        let mut query = ViewQuery {
            filter: IncidentFilter::Type(IncidentType::Behavior),
            sort: SortOrder::Oldest,
        };
        assert!(!query.is_default());
        query.reset();
        assert_eq!(query.filter, IncidentFilter::All);
        assert_eq!(query.sort, SortOrder::Newest);
    }

    #[test]
    fn filter_parses_from_query_strings() {
        assert_eq!(IncidentFilter::parse("ALL"), Some(IncidentFilter::All));
        assert_eq!(
            IncidentFilter::parse("traffic"),
            Some(IncidentFilter::Type(IncidentType::Traffic))
        );
        assert_eq!(IncidentFilter::parse("fire"), None);
        assert_eq!(SortOrder::parse("oldest"), Some(SortOrder::Oldest));
    }

    #[test]
    fn feed_partition_keeps_order() {
        let incidents = vec![
            item("a", IncidentType::Traffic, 0, None),
            item("b", IncidentType::Traffic, 1, Some(("0kg", "0min"))),
            item("c", IncidentType::Traffic, 2, None),
        ];
        let (analyzed, pending) = partition_feed(&incidents);
        assert_eq!(analyzed.len(), 1);
        assert_eq!(pending.iter().map(|i| i.id()).collect::<Vec<_>>(), ["a", "c"]);
    }

    #[test]
    fn trend_follows_sign_prefix() {
        assert_eq!(impact_trend("+5kg"), ImpactTrend::Increase);
        assert_eq!(impact_trend("-2kg"), ImpactTrend::Decrease);
        assert_eq!(impact_trend("0min"), ImpactTrend::Neutral);
    }
}
