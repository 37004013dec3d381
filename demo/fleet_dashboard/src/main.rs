mod config;
use config::{FleetDashboardConfig, ProviderKind, StorageBackend};
use fleet_core::analysis::{CannedAnalysisProvider, LlmAnalysisProvider, LlmClient};
use fleet_core::dashboard::{DashboardServer, DashboardState};
use fleet_core::{
    AnalysisProvider, IncidentFactory, IncidentRepository, IncidentStream, InMemoryKvStore,
    KvStore, RocksDbStore,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,fleet_core=info,fleet_dashboard=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        target: "fleet_dashboard",
        "Starting fleet dashboard demo: generator → analysis → dashboard"
    );

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = FleetDashboardConfig::load();

    let store: Arc<dyn KvStore> = match cfg.storage.backend {
        StorageBackend::RocksDb => {
            info!(target: "fleet_dashboard", path = %cfg.storage.path.display(), "Opening RocksDB store");
            Arc::new(RocksDbStore::open(&cfg.storage.path)?)
        }
        StorageBackend::Memory => {
            info!(target: "fleet_dashboard", "Using in-memory store; incidents will not survive restart");
            InMemoryKvStore::new()
        }
    };
    let repository = IncidentRepository::new(store, cfg.storage.slot.clone());

    let provider: Arc<dyn AnalysisProvider> = match cfg.analysis.provider {
        ProviderKind::Llm => {
            let client = LlmClient::new(cfg.analysis.llm.clone())?;
            Arc::new(LlmAnalysisProvider::new(Some(client))?)
        }
        ProviderKind::Canned => Arc::new(CannedAnalysisProvider::new(cfg.analysis.canned_latency)),
    };
    info!(target: "fleet_dashboard", provider = provider.name(), "Analysis provider ready");

    let stream = IncidentStream::new(
        cfg.stream.clone(),
        IncidentFactory::default(),
        provider,
        repository,
    );
    info!(
        target: "fleet_dashboard",
        restored = stream.len().await,
        interval_ms = cfg.stream.interval.as_millis() as u64,
        "Incident stream ready"
    );

    let server = DashboardServer::new(cfg.dashboard.clone(), DashboardState::new(stream.clone()));
    let mut server_task = tokio::spawn(server.serve());

    if cfg.autostart {
        stream.start().await;
    }

    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!(target: "fleet_dashboard", error = %e, "Failed to listen for Ctrl+C");
            }
            info!(target: "fleet_dashboard", "Shutting down...");
        }
        res = &mut server_task => {
            match res {
                Ok(Ok(())) => info!(target: "fleet_dashboard", "Dashboard server exited"),
                Ok(Err(e)) => error!(target: "fleet_dashboard", error = %e, "Dashboard server failed"),
                Err(e) => error!(target: "fleet_dashboard", error = %e, "Dashboard server task panicked"),
            }
        }
    }

    // In-flight analysis is abandoned; the pending incident is already persisted
    stream.stop();
    server_task.abort();
    Ok(())
}
