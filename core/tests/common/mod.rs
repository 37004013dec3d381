//! Shared fixtures for fleet-core integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use fleet_core::analysis::CannedAnalysisProvider;
use fleet_core::stream::StreamEvent;
use fleet_core::{
    Analysis, AnalysisProvider, GeoBounds, Incident, IncidentFactory, IncidentRepository,
    IncidentStream, InMemoryKvStore, KvStore, StreamConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};

pub const INTERVAL: Duration = Duration::from_secs(10);
pub const HIGHLIGHT: Duration = Duration::from_secs(3);

pub fn config() -> StreamConfig {
    StreamConfig {
        interval: INTERVAL,
        highlight_duration: HIGHLIGHT,
        ..StreamConfig::default()
    }
}

pub fn build_stream(
    config: StreamConfig,
    provider: Arc<dyn AnalysisProvider>,
    kv: Arc<dyn KvStore>,
) -> IncidentStream {
    IncidentStream::new(
        config,
        IncidentFactory::with_seed(GeoBounds::FRANCE, 11),
        provider,
        IncidentRepository::new(kv, "incidents"),
    )
}

pub fn memory_stream(provider: Arc<dyn AnalysisProvider>) -> IncidentStream {
    build_stream(config(), provider, InMemoryKvStore::new())
}

/// Provider whose calls block until the test hands out a permit
#[derive(Clone)]
pub struct GatedProvider {
    permits: Arc<Semaphore>,
    calls: Arc<AtomicUsize>,
}

impl GatedProvider {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for GatedProvider {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn analyze(&self, incident: &Incident) -> fleet_core::Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| fleet_core::FleetError::AnalysisError(e.to_string()))?;
        permit.forget();
        Ok(Analysis::new(&incident.id, "Analyse", "Action", "+5kg", "+20min"))
    }
}

/// Canned provider that counts calls
#[derive(Clone, Default)]
pub struct CountingProvider {
    inner: CannedAnalysisProvider,
    calls: Arc<AtomicUsize>,
}

impl CountingProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn analyze(&self, incident: &Incident) -> fleet_core::Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.analyze(incident).await
    }
}

/// Wait (on the test clock) for the first event matching `pred`
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<StreamEvent>,
    pred: impl Fn(&StreamEvent) -> bool,
) -> StreamEvent {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event feed closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for stream event")
}

/// Spin until the stream has published `n` incidents
pub async fn wait_for_len(stream: &IncidentStream, n: usize) {
    tokio::time::timeout(Duration::from_secs(120), async {
        while stream.len().await != n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("timed out waiting for collection length");
}
