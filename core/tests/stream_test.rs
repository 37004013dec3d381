//! Incident stream engine tests
//!
//! All tests run on tokio's paused clock so the 10s ticker and 3s highlight
//! window elapse instantly and deterministically.

mod common;

use common::*;
use fleet_core::analysis::{FALLBACK_EXPLANATION, FALLBACK_RECOMMENDATION};
use fleet_core::incident::templates;
use fleet_core::stream::StreamEvent;
use fleet_core::{
    Analysis, AnalysisProvider, CycleOutcome, FleetError, Incident, IncidentPhase, IncidentType,
    InMemoryKvStore, StreamConfig,
};
use async_trait::async_trait;
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

mock! {
    pub Provider {}

    #[async_trait]
    impl AnalysisProvider for Provider {
        fn name(&self) -> &'static str;
        async fn analyze(&self, incident: &Incident) -> fleet_core::Result<Analysis>;
    }
}

fn failing_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_name().return_const("mock");
    provider
        .expect_analyze()
        .returning(|_| Err(FleetError::LlmError("connection refused".to_string())));
    provider
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn start_publishes_pending_then_analyzed_then_settled() {
    let provider = GatedProvider::new();
    let stream = memory_stream(Arc::new(provider.clone()));
    let mut rx = stream.subscribe();

    assert!(stream.is_empty().await);
    assert!(stream.start().await);

    let incidents = stream.incidents().await;
    assert_eq!(incidents.len(), 1);
    let id = incidents[0].id().to_string();
    assert!(incidents[0].analysis.is_none());
    assert_eq!(stream.phase(&id).await, Some(IncidentPhase::Pending));

    provider.release(1);
    wait_for_event(&mut rx, |e| matches!(e, StreamEvent::IncidentAnalyzed { .. })).await;
    assert_eq!(stream.phase(&id).await, Some(IncidentPhase::Analyzed));
    assert!(stream.is_new(&id));

    sleep(HIGHLIGHT + Duration::from_millis(10)).await;
    assert_eq!(stream.phase(&id).await, Some(IncidentPhase::Settled));
    assert!(stream.new_ids().is_empty());

    stream.stop();
}

#[tokio::test(start_paused = true)]
async fn generated_incidents_use_their_category_pool() {
    let provider = CountingProvider::default();
    let stream = memory_stream(Arc::new(provider));

    for _ in 0..25 {
        assert!(matches!(stream.run_cycle().await, CycleOutcome::Completed { .. }));
    }
    let incidents = stream.incidents().await;
    assert_eq!(incidents.len(), 25);
    for item in &incidents {
        let t = item.incident.incident_type;
        assert!(IncidentType::ALL.contains(&t));
        assert!(templates(t).contains(&item.incident.description.as_str()));
        let analysis = item.analysis.as_ref().expect("analysis attached");
        assert_eq!(analysis.incident_id, item.incident.id);
    }
}

#[tokio::test(start_paused = true)]
async fn collection_is_newest_first() {
    let stream = memory_stream(Arc::new(CountingProvider::default()));
    let CycleOutcome::Completed { id: first } = stream.run_cycle().await else {
        panic!("first cycle should complete");
    };
    let CycleOutcome::Completed { id: second } = stream.run_cycle().await else {
        panic!("second cycle should complete");
    };
    let ids: Vec<String> = stream
        .incidents()
        .await
        .into_iter()
        .map(|i| i.incident.id)
        .collect();
    assert_eq!(ids, [second, first]);
}

// =============================================================================
// Timer
// =============================================================================

#[tokio::test(start_paused = true)]
async fn starting_twice_arms_a_single_timer() {
    let provider = CountingProvider::default();
    let stream = memory_stream(Arc::new(provider.clone()));

    assert!(stream.start().await);
    assert!(!stream.start().await);
    assert!(stream.is_active());

    // Immediate cycle plus ticks at 10s, 20s, 30s
    sleep(INTERVAL * 3 + INTERVAL / 2).await;
    assert_eq!(stream.len().await, 4);
    assert_eq!(provider.calls(), 4);

    stream.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_suppresses_future_ticks() {
    let stream = memory_stream(Arc::new(CountingProvider::default()));
    stream.start().await;
    sleep(INTERVAL + INTERVAL / 2).await;
    assert_eq!(stream.len().await, 2);

    assert!(stream.stop());
    assert!(!stream.stop());
    sleep(INTERVAL * 5).await;
    assert_eq!(stream.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_analysis_merge() {
    let provider = GatedProvider::new();
    let stream = memory_stream(Arc::new(provider.clone()));
    let mut rx = stream.subscribe();

    stream.start().await;
    stream.stop();
    assert!(!stream.is_active());

    provider.release(1);
    wait_for_event(&mut rx, |e| matches!(e, StreamEvent::IncidentAnalyzed { .. })).await;
    let incidents = stream.incidents().await;
    assert_eq!(incidents.len(), 1);
    assert!(incidents[0].is_analyzed());

    sleep(INTERVAL * 3).await;
    assert_eq!(stream.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn toggle_pauses_and_resumes() {
    let stream = memory_stream(Arc::new(CountingProvider::default()));
    assert!(stream.toggle().await);
    assert!(stream.is_active());
    assert_eq!(stream.len().await, 1);
    // Let the first analysis land so the gate is free again
    sleep(Duration::from_millis(1)).await;

    assert!(!stream.toggle().await);
    assert!(!stream.is_active());

    assert!(stream.toggle().await);
    assert_eq!(stream.len().await, 2);
    stream.stop();
}

// =============================================================================
// Single-flight gate
// =============================================================================

#[tokio::test(start_paused = true)]
async fn overlapping_cycle_is_skipped() {
    let provider = GatedProvider::new();
    let stream = memory_stream(Arc::new(provider.clone()));

    let background = stream.clone();
    let first = tokio::spawn(async move { background.run_cycle().await });
    wait_for_len(&stream, 1).await;
    assert!(stream.is_processing());

    assert_eq!(stream.run_cycle().await, CycleOutcome::Skipped);
    assert_eq!(stream.len().await, 1);
    assert_eq!(provider.calls(), 1);

    provider.release(1);
    assert!(matches!(first.await.unwrap(), CycleOutcome::Completed { .. }));
    assert!(!stream.is_processing());
}

#[tokio::test(start_paused = true)]
async fn ticks_during_slow_analysis_are_dropped() {
    let provider = GatedProvider::new();
    let stream = memory_stream(Arc::new(provider.clone()));

    stream.start().await;
    // Three ticks fire while the first analysis is still pending
    sleep(INTERVAL * 3 + INTERVAL / 2).await;
    assert_eq!(stream.len().await, 1);
    assert_eq!(provider.calls(), 1);

    stream.stop();
    provider.release(1);
}

#[tokio::test(start_paused = true)]
async fn gate_is_released_after_provider_panic() {
    struct PanicOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisProvider for PanicOnce {
        fn name(&self) -> &'static str {
            "panic-once"
        }

        async fn analyze(&self, incident: &Incident) -> fleet_core::Result<Analysis> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("provider blew up");
            }
            Ok(Analysis::new(&incident.id, "e", "r", "0kg", "0min"))
        }
    }

    let stream = memory_stream(Arc::new(PanicOnce {
        calls: AtomicUsize::new(0),
    }));

    let background = stream.clone();
    let result = tokio::spawn(async move { background.run_cycle().await }).await;
    assert!(result.unwrap_err().is_panic());
    assert!(!stream.is_processing());

    assert!(matches!(stream.run_cycle().await, CycleOutcome::Completed { .. }));
    assert_eq!(stream.len().await, 2);
}

// =============================================================================
// Failure and clear handling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn provider_error_yields_fallback_analysis() {
    let stream = memory_stream(Arc::new(failing_provider()));

    let CycleOutcome::Completed { id } = stream.run_cycle().await else {
        panic!("cycle should complete with fallback");
    };
    let analysis = stream.get(&id).await.unwrap().analysis.unwrap();
    assert_eq!(analysis.incident_id, id);
    assert_eq!(analysis.explanation, FALLBACK_EXPLANATION);
    assert_eq!(analysis.recommendation, FALLBACK_RECOMMENDATION);
    assert_eq!(analysis.impact_co2, "0kg");
    assert_eq!(analysis.impact_time, "+10min");
    assert!(!stream.is_processing());
}

#[tokio::test(start_paused = true)]
async fn clear_during_analysis_discards_result() {
    let provider = GatedProvider::new();
    let stream = memory_stream(Arc::new(provider.clone()));

    let background = stream.clone();
    let cycle = tokio::spawn(async move { background.run_cycle().await });
    wait_for_len(&stream, 1).await;
    let id = stream.incidents().await[0].id().to_string();

    assert_eq!(stream.clear().await, 1);
    provider.release(1);

    assert_eq!(cycle.await.unwrap(), CycleOutcome::Discarded { id: id.clone() });
    assert!(stream.is_empty().await);
    assert!(!stream.is_new(&id));
    assert_eq!(stream.phase(&id).await, None);
    assert!(!stream.is_processing());
}

#[tokio::test(start_paused = true)]
async fn clear_keeps_stale_highlights_by_default() {
    let stream = memory_stream(Arc::new(CountingProvider::default()));
    let CycleOutcome::Completed { id } = stream.run_cycle().await else {
        panic!("cycle should complete");
    };
    assert!(stream.is_new(&id));

    stream.clear().await;
    assert!(stream.is_empty().await);
    assert!(stream.is_new(&id));
    assert_eq!(stream.phase(&id).await, None);

    sleep(HIGHLIGHT + Duration::from_millis(10)).await;
    assert!(!stream.is_new(&id));
}

#[tokio::test(start_paused = true)]
async fn clear_can_purge_highlights() {
    let config = StreamConfig {
        purge_highlights_on_clear: true,
        ..common::config()
    };
    let stream = build_stream(
        config,
        Arc::new(CountingProvider::default()),
        InMemoryKvStore::new(),
    );
    let mut rx = stream.subscribe();
    stream.run_cycle().await;
    assert_eq!(stream.new_ids().len(), 1);

    stream.clear().await;
    assert!(stream.new_ids().is_empty());

    // The cancelled timer never reports an expiry
    sleep(HIGHLIGHT * 2).await;
    let mut expired = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, StreamEvent::HighlightExpired { .. }) {
            expired += 1;
        }
    }
    assert_eq!(expired, 0);
}

#[tokio::test(start_paused = true)]
async fn change_feed_reports_cycle_events_in_order() {
    let stream = memory_stream(Arc::new(CountingProvider::default()));
    let mut rx = stream.subscribe();

    stream.run_cycle().await;
    stream.clear().await;
    sleep(HIGHLIGHT + Duration::from_millis(10)).await;

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert_eq!(
        names,
        ["incident_created", "incident_analyzed", "cleared", "highlight_expired"]
    );
}
