//! Per-provider response time tracking.

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Running response-time statistics for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub samples: u64,
    pub avg_response_secs: f64,
    pub last_response_secs: f64,
}

/// Concurrent map of provider name to [`PerformanceStats`].
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    stats: DashMap<String, PerformanceStats>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one successful call's latency into the provider's running average.
    pub fn record(&self, provider: &str, latency: Duration) {
        let secs = latency.as_secs_f64();
        let mut entry = self.stats.entry(provider.to_string()).or_default();
        let stats = entry.value_mut();
        stats.samples += 1;
        stats.avg_response_secs += (secs - stats.avg_response_secs) / stats.samples as f64;
        stats.last_response_secs = secs;
    }

    /// Average response time in seconds, `None` without history.
    pub fn avg_response_secs(&self, provider: &str) -> Option<f64> {
        self.stats.get(provider).map(|s| s.avg_response_secs)
    }

    pub fn stats(&self, provider: &str) -> Option<PerformanceStats> {
        self.stats.get(provider).map(|s| s.value().clone())
    }
}
