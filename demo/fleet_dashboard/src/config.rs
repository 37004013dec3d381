use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fleet_core::analysis::LlmClientConfig;
use fleet_core::dashboard::DashboardConfig;
use fleet_core::storage::DEFAULT_SLOT;
use fleet_core::StreamConfig;

/// High-level configuration for the fleet dashboard demo
#[derive(Clone, Debug)]
pub struct FleetDashboardConfig {
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub stream: StreamConfig,
    pub dashboard: DashboardConfig,
    /// Start generating incidents as soon as the server is up
    pub autostart: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    RocksDb,
    Memory,
}

impl StorageBackend {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rocksdb" | "rocks" => Some(Self::RocksDb),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Where the incident collection lives between runs
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
    pub slot: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: std::env::var("FLEET_STORAGE")
                .ok()
                .and_then(|s| StorageBackend::parse(&s))
                .unwrap_or(StorageBackend::RocksDb),
            path: std::env::var("FLEET_DB_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("fleet_data")),
            slot: std::env::var("FLEET_SLOT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SLOT.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Llm,
    Canned,
}

impl ProviderKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Some(Self::Llm),
            "canned" | "offline" => Some(Self::Canned),
            _ => None,
        }
    }
}

/// Which analysis provider to wire into the stream
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub provider: ProviderKind,
    /// Simulated round trip for the canned provider
    pub canned_latency: Duration,
    pub llm: LlmClientConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: std::env::var("FLEET_ANALYSIS_PROVIDER")
                .ok()
                .and_then(|s| ProviderKind::parse(&s))
                .unwrap_or(ProviderKind::Llm),
            canned_latency: std::env::var("FLEET_CANNED_LATENCY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(800)),
            llm: LlmClientConfig::default(),
        }
    }
}

impl Default for FleetDashboardConfig {
    fn default() -> Self {
        // Module defaults already consider env vars
        Self {
            storage: StorageConfig::default(),
            analysis: AnalysisConfig::default(),
            stream: StreamConfig::from_env(),
            dashboard: DashboardConfig::from_env(),
            autostart: std::env::var("FLEET_AUTOSTART")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

impl FleetDashboardConfig {
    /// Load configuration from a TOML file (path via FLEET_DASHBOARD_CONFIG or ./fleet_dashboard.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("FLEET_DASHBOARD_CONFIG")
            .unwrap_or_else(|_| "fleet_dashboard.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "fleet_dashboard", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => Self::from_toml_str(&s, default),
            Err(e) => {
                tracing::warn!(target: "fleet_dashboard", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    fn from_toml_str(s: &str, default: Self) -> Self {
        match toml::from_str::<FleetDashboardToml>(s) {
            Ok(t) => t.overlay(default),
            Err(e) => {
                tracing::warn!(target: "fleet_dashboard", error = %e, "Failed to parse TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct FleetDashboardToml {
    pub autostart: Option<bool>,
    pub storage: Option<StorageToml>,
    pub analysis: Option<AnalysisToml>,
    pub stream: Option<StreamToml>,
    pub dashboard: Option<DashboardToml>,
}

impl FleetDashboardToml {
    fn overlay(self, mut base: FleetDashboardConfig) -> FleetDashboardConfig {
        if let Some(a) = self.autostart {
            base.autostart = a;
        }
        if let Some(s) = self.storage {
            s.apply(&mut base.storage);
        }
        if let Some(a) = self.analysis {
            a.apply(&mut base.analysis);
        }
        if let Some(s) = self.stream {
            s.apply(&mut base.stream);
        }
        if let Some(d) = self.dashboard {
            d.apply(&mut base.dashboard);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct StorageToml {
    pub backend: Option<String>,
    pub path: Option<PathBuf>,
    pub slot: Option<String>,
}
impl StorageToml {
    fn apply(self, s: &mut StorageConfig) {
        if let Some(x) = self.backend.as_deref().and_then(StorageBackend::parse) {
            s.backend = x;
        }
        if let Some(x) = self.path {
            s.path = x;
        }
        if let Some(x) = self.slot.filter(|x| !x.is_empty()) {
            s.slot = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AnalysisToml {
    pub provider: Option<String>,
    pub canned_latency_ms: Option<u64>,
    pub llm: Option<LlmToml>,
}
impl AnalysisToml {
    fn apply(self, a: &mut AnalysisConfig) {
        if let Some(x) = self.provider.as_deref().and_then(ProviderKind::parse) {
            a.provider = x;
        }
        if let Some(x) = self.canned_latency_ms {
            a.canned_latency = Duration::from_millis(x);
        }
        if let Some(l) = self.llm {
            l.apply(&mut a.llm);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
}
impl LlmToml {
    fn apply(self, l: &mut LlmClientConfig) {
        if let Some(x) = self.base_url {
            l.base_url = x;
        }
        if let Some(x) = self.model {
            l.model = x;
        }
        if let Some(x) = self.api_key {
            l.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            l.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            l.temperature = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct StreamToml {
    pub interval_ms: Option<u64>,
    pub highlight_ms: Option<u64>,
    pub purge_highlights_on_clear: Option<bool>,
    pub event_capacity: Option<usize>,
}
impl StreamToml {
    fn apply(self, s: &mut StreamConfig) {
        if let Some(x) = self.interval_ms.filter(|ms| *ms > 0) {
            s.interval = Duration::from_millis(x);
        }
        if let Some(x) = self.highlight_ms.filter(|ms| *ms > 0) {
            s.highlight_duration = Duration::from_millis(x);
        }
        if let Some(x) = self.purge_highlights_on_clear {
            s.purge_highlights_on_clear = x;
        }
        if let Some(x) = self.event_capacity.filter(|n| *n > 0) {
            s.event_capacity = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DashboardToml {
    pub host: Option<String>,
    pub port: Option<u16>,
}
impl DashboardToml {
    fn apply(self, d: &mut DashboardConfig) {
        if let Some(x) = self.host {
            d.host = x;
        }
        if let Some(x) = self.port {
            d.port = x;
        }
    }
}
