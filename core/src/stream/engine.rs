use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::analysis::{analyze_or_fallback, AnalysisProvider};
use crate::incident::{Incident, IncidentFactory, IncidentPhase, IncidentWithAnalysis};
use crate::storage::IncidentRepository;

use super::config::StreamConfig;
use super::event::{StreamBroadcaster, StreamEvent};

/// Result of a single generate-then-analyze cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was in flight; nothing happened
    Skipped,
    /// Analysis merged into the incident
    Completed { id: String },
    /// Incident was cleared before its analysis resolved
    Discarded { id: String },
}

/// Highlight bookkeeping for one incident id
struct HighlightEntry {
    generation: u64,
    expiry: Option<AbortHandle>,
}

struct StreamInner {
    config: StreamConfig,
    factory: IncidentFactory,
    provider: Arc<dyn AnalysisProvider>,
    repository: IncidentRepository,
    /// Newest first
    incidents: RwLock<Vec<IncidentWithAnalysis>>,
    /// Bumped under the `incidents` write lock on every mutation
    revision: AtomicU64,
    /// Revision of the last snapshot written to the repository
    persisted: Mutex<u64>,
    highlights: DashMap<String, HighlightEntry>,
    highlight_generation: AtomicU64,
    is_active: AtomicBool,
    is_processing: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
    events: StreamBroadcaster,
}

/// Releases the single-flight gate when dropped, on every exit path
struct ProcessingGuard {
    inner: Arc<StreamInner>,
}

impl ProcessingGuard {
    fn acquire(inner: &Arc<StreamInner>) -> Option<Self> {
        inner
            .is_processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.inner.is_processing.store(false, Ordering::Release);
    }
}

/// Incident published and awaiting analysis; holds the gate
struct PendingCycle {
    incident: Incident,
    _guard: ProcessingGuard,
}

/// Incident stream engine.
///
/// Owns the incident collection, drives periodic generation, enriches each
/// incident through the analysis provider and tracks the transient "new"
/// highlight set. Cloning is cheap and yields a handle to the same stream.
#[derive(Clone)]
pub struct IncidentStream {
    inner: Arc<StreamInner>,
}

impl IncidentStream {
    /// Build the engine, seeding the collection from the repository
    pub fn new(
        config: StreamConfig,
        factory: IncidentFactory,
        provider: Arc<dyn AnalysisProvider>,
        repository: IncidentRepository,
    ) -> Self {
        let incidents = match repository.load() {
            Ok(items) => items,
            Err(e) => {
                warn!(target: "incident_stream", slot = repository.slot(), error = %e, "Failed to load persisted incidents; starting empty");
                Vec::new()
            }
        };
        info!(
            target: "incident_stream",
            restored = incidents.len(),
            interval_ms = config.interval.as_millis() as u64,
            provider = provider.name(),
            "Incident stream initialized"
        );

        let events = StreamBroadcaster::new(config.event_capacity);
        Self {
            inner: Arc::new(StreamInner {
                config,
                factory,
                provider,
                repository,
                incidents: RwLock::new(incidents),
                revision: AtomicU64::new(0),
                persisted: Mutex::new(0),
                highlights: DashMap::new(),
                highlight_generation: AtomicU64::new(0),
                is_active: AtomicBool::new(false),
                is_processing: AtomicBool::new(false),
                ticker: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active.load(Ordering::Acquire)
    }

    pub fn is_processing(&self) -> bool {
        self.inner.is_processing.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the collection, newest first
    pub async fn incidents(&self) -> Vec<IncidentWithAnalysis> {
        self.inner.incidents.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.incidents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.incidents.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<IncidentWithAnalysis> {
        self.inner
            .incidents
            .read()
            .await
            .iter()
            .find(|i| i.id() == id)
            .cloned()
    }

    pub fn is_new(&self, id: &str) -> bool {
        self.inner.highlights.contains_key(id)
    }

    pub fn new_ids(&self) -> HashSet<String> {
        self.inner
            .highlights
            .iter()
            .map(|e| e.key().clone())
            .collect()
    }

    /// Lifecycle phase, or `None` once the incident is no longer in the collection
    pub async fn phase(&self, id: &str) -> Option<IncidentPhase> {
        let analyzed = self.get(id).await?.is_analyzed();
        Some(match (analyzed, self.is_new(id)) {
            (false, _) => IncidentPhase::Pending,
            (true, true) => IncidentPhase::Analyzed,
            (true, false) => IncidentPhase::Settled,
        })
    }

    /// Run one cycle now and arm the recurring ticker.
    ///
    /// Returns `false` without side effects when the stream is already active.
    /// The first incident is published (pending) before this returns; its
    /// analysis completes in the background.
    pub async fn start(&self) -> bool {
        if self
            .inner
            .is_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(target: "incident_stream", "Start ignored; stream already active");
            return false;
        }
        info!(target: "incident_stream", "Incident stream started");
        self.inner.events.broadcast(StreamEvent::Started);

        if let Some(pending) = self.begin_cycle().await {
            let this = self.clone();
            tokio::spawn(async move {
                this.finish_cycle(pending).await;
            });
        }

        let handle = tokio::spawn(run_ticker(
            Arc::downgrade(&self.inner),
            self.inner.config.interval,
        ));
        let previous = self
            .inner
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        true
    }

    /// Cancel the ticker. In-flight analyses still complete and merge.
    ///
    /// Returns `false` when the stream was not active.
    pub fn stop(&self) -> bool {
        if self
            .inner
            .is_active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let handle = self
            .inner
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        info!(target: "incident_stream", "Incident stream stopped");
        self.inner.events.broadcast(StreamEvent::Stopped);
        true
    }

    /// Pause when active, resume otherwise. Returns the new active state.
    pub async fn toggle(&self) -> bool {
        if self.is_active() {
            self.stop();
            false
        } else {
            self.start().await;
            true
        }
    }

    /// Generate one incident and enrich it with an analysis.
    ///
    /// Skipped entirely while another cycle is in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        match self.begin_cycle().await {
            Some(pending) => self.finish_cycle(pending).await,
            None => CycleOutcome::Skipped,
        }
    }

    /// Empty the collection. Returns how many incidents were removed.
    pub async fn clear(&self) -> usize {
        let (removed, revision) = {
            let mut incidents = self.inner.incidents.write().await;
            let removed = incidents.len();
            incidents.clear();
            (removed, self.bump_revision())
        };
        self.persist(revision, &[]);
        if self.inner.config.purge_highlights_on_clear {
            self.purge_highlights();
        }
        info!(target: "incident_stream", removed, "Incidents cleared");
        self.inner.events.broadcast(StreamEvent::Cleared);
        removed
    }

    async fn begin_cycle(&self) -> Option<PendingCycle> {
        let Some(guard) = ProcessingGuard::acquire(&self.inner) else {
            debug!(target: "incident_stream", "Cycle skipped; previous cycle still in flight");
            return None;
        };

        let incident = self.inner.factory.generate();
        let published = IncidentWithAnalysis::pending(incident.clone());
        let (snapshot, revision) = {
            let mut incidents = self.inner.incidents.write().await;
            incidents.insert(0, published.clone());
            (incidents.clone(), self.bump_revision())
        };
        self.persist(revision, &snapshot);
        debug!(
            target: "incident_stream",
            incident_id = %incident.id,
            incident_type = %incident.incident_type,
            "Incident published"
        );
        self.inner.events.broadcast(StreamEvent::IncidentCreated {
            incident: published,
        });

        Some(PendingCycle {
            incident,
            _guard: guard,
        })
    }

    async fn finish_cycle(&self, pending: PendingCycle) -> CycleOutcome {
        let analysis = analyze_or_fallback(self.inner.provider.as_ref(), &pending.incident).await;
        let id = pending.incident.id.clone();

        let merged = {
            let mut incidents = self.inner.incidents.write().await;
            let merged = incidents.iter_mut().find(|i| i.id() == id).map(|item| {
                item.analysis = Some(analysis);
                item.clone()
            });
            merged.map(|item| (item, incidents.clone(), self.bump_revision()))
        };

        let Some((incident, snapshot, revision)) = merged else {
            debug!(target: "incident_stream", incident_id = %id, "Incident cleared before analysis resolved; dropping result");
            return CycleOutcome::Discarded { id };
        };
        self.persist(revision, &snapshot);

        self.highlight(&id);
        debug!(target: "incident_stream", incident_id = %id, "Analysis merged");
        self.inner
            .events
            .broadcast(StreamEvent::IncidentAnalyzed { incident });
        CycleOutcome::Completed { id }
    }

    /// Flag `id` as new and schedule its removal after the highlight window
    fn highlight(&self, id: &str) {
        let generation = self
            .inner
            .highlight_generation
            .fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self.inner.highlights.insert(
            id.to_string(),
            HighlightEntry {
                generation,
                expiry: None,
            },
        ) {
            if let Some(handle) = previous.expiry {
                handle.abort();
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let key = id.to_string();
        let window = self.inner.config.highlight_duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let expired = inner
                .highlights
                .remove_if(&key, |_, entry| entry.generation == generation)
                .is_some();
            if expired {
                inner
                    .events
                    .broadcast(StreamEvent::HighlightExpired { id: key });
            }
        });

        if let Some(mut entry) = self.inner.highlights.get_mut(id) {
            if entry.generation == generation {
                entry.expiry = Some(task.abort_handle());
            }
        }
    }

    fn purge_highlights(&self) {
        for entry in self.inner.highlights.iter() {
            if let Some(handle) = &entry.value().expiry {
                handle.abort();
            }
        }
        self.inner.highlights.clear();
    }

    /// Must be called while holding the `incidents` write lock
    fn bump_revision(&self) -> u64 {
        self.inner.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Write a snapshot taken at `revision`, after the collection lock is released.
    /// Snapshots older than the last one written are skipped.
    fn persist(&self, revision: u64, snapshot: &[IncidentWithAnalysis]) {
        let mut persisted = self
            .inner
            .persisted
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if revision <= *persisted {
            debug!(target: "incident_stream", revision, latest = *persisted, "Skipping stale snapshot");
            return;
        }
        match self.inner.repository.save(snapshot) {
            Ok(()) => *persisted = revision,
            Err(e) => {
                warn!(target: "incident_stream", error = %e, "Failed to persist incidents");
            }
        }
    }
}

/// Recurring generation loop. Exits once the stream is dropped or deactivated.
async fn run_ticker(inner: Weak<StreamInner>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.is_active.load(Ordering::Acquire) {
            break;
        }
        let stream = IncidentStream { inner };
        tokio::spawn(async move {
            stream.run_cycle().await;
        });
    }
}
