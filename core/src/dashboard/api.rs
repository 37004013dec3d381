// Dashboard HTTP API server
//
// Provides REST endpoints and SSE streaming for the incident dashboard UI

use crate::dashboard::handlers;
use crate::dashboard::DashboardConfig;
use crate::shortcuts::ShortcutMap;
use crate::stream::IncidentStream;
use crate::views::ViewQuery;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Dashboard server state
#[derive(Clone)]
pub struct DashboardState {
    pub stream: IncidentStream,
    /// Filter/sort selection shared by every client
    pub view: Arc<RwLock<ViewQuery>>,
    pub shortcuts: Arc<ShortcutMap>,
}

impl DashboardState {
    pub fn new(stream: IncidentStream) -> Self {
        Self {
            stream,
            view: Arc::new(RwLock::new(ViewQuery::default())),
            shortcuts: Arc::new(ShortcutMap::default()),
        }
    }
}

/// Dashboard HTTP server
pub struct DashboardServer {
    config: DashboardConfig,
    state: DashboardState,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig, state: DashboardState) -> Self {
        Self { config, state }
    }

    /// Route table, also used directly by tests
    pub fn router(state: DashboardState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/incidents", get(handlers::list_incidents))
            .route("/api/incidents/clear", post(handlers::clear_incidents))
            .route("/api/incidents/:id", get(handlers::get_incident))
            .route("/api/feed", get(handlers::feed))
            .route("/api/stats", get(handlers::stats))
            .route("/api/export.csv", get(handlers::export_csv))
            .route("/api/stream", get(handlers::stream_status))
            .route("/api/stream/start", post(handlers::start_stream))
            .route("/api/stream/stop", post(handlers::stop_stream))
            .route("/api/stream/toggle", post(handlers::toggle_stream))
            .route("/api/view", get(handlers::get_view).put(handlers::set_view))
            .route("/api/view/reset", post(handlers::reset_view))
            .route("/api/shortcuts", get(handlers::list_shortcuts))
            .route("/api/shortcut", post(handlers::dispatch_shortcut))
            .route("/api/events", get(handlers::event_stream))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(state)
    }

    /// Start the Dashboard server
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr();
        info!(
            target: "dashboard",
            addr = %addr,
            "Starting Dashboard server"
        );

        let app = Self::router(self.state);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(
            target: "dashboard",
            url = %format!("http://{}", addr),
            "Dashboard server ready"
        );

        axum::serve(listener, app).await?;

        Ok(())
    }
}
