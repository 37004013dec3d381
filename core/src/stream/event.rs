// Change feed for stream consumers
//
// Uses tokio broadcast channel so several views (SSE clients, loggers) can follow the stream

use crate::incident::IncidentWithAnalysis;
use serde::Serialize;
use tokio::sync::broadcast;

/// State change published by the stream engine
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Ticker armed
    Started,
    /// Ticker cancelled
    Stopped,
    /// Incident published in pending state
    IncidentCreated { incident: IncidentWithAnalysis },
    /// Analysis merged; incident is highlighted
    IncidentAnalyzed { incident: IncidentWithAnalysis },
    /// Highlight window elapsed
    HighlightExpired { id: String },
    /// Collection emptied
    Cleared,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Started => "started",
            StreamEvent::Stopped => "stopped",
            StreamEvent::IncidentCreated { .. } => "incident_created",
            StreamEvent::IncidentAnalyzed { .. } => "incident_analyzed",
            StreamEvent::HighlightExpired { .. } => "highlight_expired",
            StreamEvent::Cleared => "cleared",
        }
    }
}

/// Broadcaster for stream events
#[derive(Clone)]
pub struct StreamBroadcaster {
    sender: broadcast::Sender<StreamEvent>,
}

impl StreamBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn broadcast(&self, event: StreamEvent) {
        // Ignore error if no subscribers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }
}

impl Default for StreamBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
