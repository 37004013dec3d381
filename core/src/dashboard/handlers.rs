// Request handlers for the dashboard API

use crate::dashboard::DashboardState;
use crate::export;
use crate::incident::{IncidentPhase, IncidentWithAnalysis};
use crate::shortcuts::{KeyPress, Shortcut, ShortcutAction};
use crate::stream::IncidentStream;
use crate::views::{self, ImpactTrend, IncidentFilter, IncidentStats, SortOrder, ViewQuery};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{info, warn};

/// Incident plus its highlight flag and display hints, as sent to clients
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentView {
    #[serde(flatten)]
    pub item: IncidentWithAnalysis,
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<IncidentPhase>,
    /// Localized category label
    pub type_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_trend: Option<ImpactTrend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_trend: Option<ImpactTrend>,
}

impl IncidentView {
    fn new(item: IncidentWithAnalysis, is_new: bool, phase: Option<IncidentPhase>) -> Self {
        let analysis = item.analysis.as_ref();
        Self {
            type_label: views::type_label(item.incident.incident_type).to_string(),
            co2_trend: analysis.map(|a| views::impact_trend(&a.impact_co2)),
            time_trend: analysis.map(|a| views::impact_trend(&a.impact_time)),
            item,
            is_new,
            phase,
        }
    }
}

/// Collection split for the feed panel
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedView {
    pub analyzed: Vec<IncidentView>,
    pub pending: Vec<IncidentView>,
}

/// Stats with preformatted impact totals
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    #[serde(flatten)]
    pub stats: IncidentStats,
    pub co2_display: String,
    pub time_display: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamStatus {
    pub active: bool,
    pub processing: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportPayload {
    pub filename: String,
    pub csv: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShortcutResponse {
    pub actions: Vec<ShortcutAction>,
    pub stream: StreamStatus,
    pub view: ViewQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(rename = "type")]
    incident_type: Option<String>,
    sort: Option<String>,
}

fn status_of(stream: &IncidentStream) -> StreamStatus {
    StreamStatus {
        active: stream.is_active(),
        processing: stream.is_processing(),
    }
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

/// Shared view selection, overridden by any query params
async fn resolve_view(state: &DashboardState, query: &ListQuery) -> Result<ViewQuery, StatusCode> {
    let mut view = *state.view.read().await;
    if let Some(t) = query.incident_type.as_deref() {
        view.filter = IncidentFilter::parse(t).ok_or(StatusCode::BAD_REQUEST)?;
    }
    if let Some(s) = query.sort.as_deref() {
        view.sort = SortOrder::parse(s).ok_or(StatusCode::BAD_REQUEST)?;
    }
    Ok(view)
}

fn to_views(stream: &IncidentStream, items: Vec<IncidentWithAnalysis>) -> Vec<IncidentView> {
    items
        .into_iter()
        .map(|item| {
            let is_new = stream.is_new(item.id());
            IncidentView::new(item, is_new, None)
        })
        .collect()
}

/// List incidents. Query params override the shared view selection.
pub(crate) async fn list_incidents(
    State(state): State<DashboardState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<IncidentView>>, StatusCode> {
    let view = resolve_view(&state, &query).await?;
    let incidents = state.stream.incidents().await;
    Ok(Json(to_views(&state.stream, view.apply(&incidents))))
}

/// Analyzed and pending incidents, each in view order
pub(crate) async fn feed(
    State(state): State<DashboardState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<FeedView>, StatusCode> {
    let view = resolve_view(&state, &query).await?;
    let incidents = state.stream.incidents().await;
    let (analyzed, pending) = views::partition_feed(&view.apply(&incidents));
    Ok(Json(FeedView {
        analyzed: to_views(&state.stream, analyzed),
        pending: to_views(&state.stream, pending),
    }))
}

pub(crate) async fn get_incident(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
) -> Result<Json<IncidentView>, StatusCode> {
    let item = state.stream.get(&id).await.ok_or(StatusCode::NOT_FOUND)?;
    let phase = state.stream.phase(&id).await;
    Ok(Json(IncidentView::new(item, state.stream.is_new(&id), phase)))
}

pub(crate) async fn stats(State(state): State<DashboardState>) -> Json<StatsView> {
    let stats = views::compute_stats(&state.stream.incidents().await);
    Json(StatsView {
        co2_display: stats.co2_display(),
        time_display: stats.time_display(),
        stats,
    })
}

async fn build_export(stream: &IncidentStream) -> ExportPayload {
    let incidents = stream.incidents().await;
    ExportPayload {
        filename: export::export_filename(chrono::Utc::now()),
        csv: export::to_csv(&incidents),
    }
}

pub(crate) async fn export_csv(State(state): State<DashboardState>) -> Response {
    let payload = build_export(&state.stream).await;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", payload.filename),
            ),
        ],
        payload.csv,
    )
        .into_response()
}

pub(crate) async fn stream_status(State(state): State<DashboardState>) -> Json<StreamStatus> {
    Json(status_of(&state.stream))
}

pub(crate) async fn start_stream(State(state): State<DashboardState>) -> Json<StreamStatus> {
    state.stream.start().await;
    Json(status_of(&state.stream))
}

pub(crate) async fn stop_stream(State(state): State<DashboardState>) -> Json<StreamStatus> {
    state.stream.stop();
    Json(status_of(&state.stream))
}

pub(crate) async fn toggle_stream(State(state): State<DashboardState>) -> Json<StreamStatus> {
    state.stream.toggle().await;
    Json(status_of(&state.stream))
}

pub(crate) async fn clear_incidents(State(state): State<DashboardState>) -> Json<serde_json::Value> {
    let removed = state.stream.clear().await;
    Json(serde_json::json!({ "removed": removed }))
}

pub(crate) async fn get_view(State(state): State<DashboardState>) -> Json<ViewQuery> {
    Json(*state.view.read().await)
}

pub(crate) async fn set_view(
    State(state): State<DashboardState>,
    Json(query): Json<ViewQuery>,
) -> Json<ViewQuery> {
    *state.view.write().await = query;
    Json(query)
}

pub(crate) async fn reset_view(State(state): State<DashboardState>) -> Json<ViewQuery> {
    let mut view = state.view.write().await;
    view.reset();
    Json(*view)
}

pub(crate) async fn list_shortcuts(State(state): State<DashboardState>) -> Json<Vec<Shortcut>> {
    Json(state.shortcuts.bindings().to_vec())
}

/// Resolve a key press against the bindings and run the matching actions
pub(crate) async fn dispatch_shortcut(
    State(state): State<DashboardState>,
    Json(press): Json<KeyPress>,
) -> Json<ShortcutResponse> {
    let actions = state.shortcuts.resolve(&press);
    let mut export = None;
    for action in &actions {
        info!(target: "dashboard", action = ?action, "Shortcut triggered");
        match action {
            ShortcutAction::ToggleStream => {
                state.stream.toggle().await;
            }
            ShortcutAction::Export => export = Some(build_export(&state.stream).await),
            ShortcutAction::ResetFilters => state.view.write().await.reset(),
        }
    }
    Json(ShortcutResponse {
        actions,
        stream: status_of(&state.stream),
        view: *state.view.read().await,
        export,
    })
}

/// SSE endpoint for stream changes
pub(crate) async fn event_stream(
    State(state): State<DashboardState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    info!(target: "dashboard", "New SSE client connected");

    let rx = state.stream.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().event(event.name()).data(json))),
            Err(e) => {
                warn!(target: "dashboard", error = %e, "Failed to serialize event");
                None
            }
        },
        Err(e) => {
            warn!(target: "dashboard", error = %e, "Broadcast error");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
