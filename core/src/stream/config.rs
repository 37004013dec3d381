use std::time::Duration;

/// Stream engine configuration
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Delay between generation cycles
    pub interval: Duration,
    /// How long an analyzed incident stays flagged as new
    pub highlight_duration: Duration,
    /// Cancel pending highlight timers and empty the new-id set on clear.
    /// Off by default: stale ids are left to expire on their own.
    pub purge_highlights_on_clear: bool,
    /// Buffer size of the change-feed broadcast channel
    pub event_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            highlight_duration: Duration::from_secs(3),
            purge_highlights_on_clear: false,
            event_capacity: 256,
        }
    }
}

impl StreamConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            interval: env_millis("FLEET_INCIDENT_INTERVAL_MS").unwrap_or(default.interval),
            highlight_duration: env_millis("FLEET_HIGHLIGHT_MS")
                .unwrap_or(default.highlight_duration),
            purge_highlights_on_clear: std::env::var("FLEET_PURGE_HIGHLIGHTS_ON_CLEAR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.purge_highlights_on_clear),
            event_capacity: std::env::var("FLEET_EVENT_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default.event_capacity),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
