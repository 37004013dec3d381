// Dashboard module - HTTP API over the incident stream
//
// Serves the incident collection, derived views, CSV export, stream controls,
// keyboard shortcut dispatch and an SSE change feed.

mod api;
mod handlers;

pub use api::{DashboardServer, DashboardState};
pub use handlers::{FeedView, IncidentView, ShortcutResponse, StatsView, StreamStatus};

/// Dashboard configuration
#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub port: u16,
    pub host: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("FLEET_DASHBOARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3030),
            host: std::env::var("FLEET_DASHBOARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
