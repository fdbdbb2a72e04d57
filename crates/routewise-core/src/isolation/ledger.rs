//! Failure ledger and provider isolation state machine.
//!
//! States per provider:
//!
//! ```text
//! Healthy --(threshold failures within window)--> Isolated
//! Isolated --(isolation duration elapsed)--> RecoveryCheck
//! RecoveryCheck --(registry reports healthy)--> Healthy
//! RecoveryCheck --(still unhealthy / lookup error)--> Isolated
//! ```
//!
//! Isolation only filters candidates during selection. Requests already
//! routed to a provider are never interrupted by it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use routewise_types::failure::{
    FailureEvent, FailureStatistics, FailureType, ProviderFailureStats, ProviderIsolationStatus,
};

use super::performance::PerformanceTracker;
use crate::config::SharedConfig;
use crate::provider::registry::Registry;

/// Isolation status plus the failure timestamps still inside the window.
#[derive(Debug, Default)]
struct IsolationEntry {
    status: ProviderIsolationStatus,
    recent: VecDeque<DateTime<Utc>>,
}

/// Process-wide failure state shared by every in-flight request.
///
/// Each provider's isolation entry is only read or modified while holding
/// its `DashMap` shard guard, so concurrent failure bursts never lose updates.
pub struct FailureLedger {
    registry: Arc<dyn Registry>,
    config: SharedConfig,
    history: Mutex<VecDeque<FailureEvent>>,
    isolation: DashMap<String, IsolationEntry>,
    performance: PerformanceTracker,
}

impl FailureLedger {
    pub fn new(registry: Arc<dyn Registry>, config: SharedConfig) -> Self {
        Self {
            registry,
            config,
            history: Mutex::new(VecDeque::new()),
            isolation: DashMap::new(),
            performance: PerformanceTracker::new(),
        }
    }

    /// Record a failed invocation and isolate the provider if its recent
    /// failure streak reaches the threshold.
    ///
    /// Returns the stored event; `isolation_triggered` tells whether this
    /// failure tipped the provider into isolation.
    pub fn record_failure(
        &self,
        provider: &str,
        model: Option<&str>,
        failure_type: FailureType,
        error_message: &str,
        request_type: &str,
    ) -> FailureEvent {
        let config = self.config.current();
        let now = Utc::now();
        let threshold = config.max_failure_threshold;
        let window_start = before(now, config.failure_window());

        let mut event = FailureEvent {
            timestamp: now,
            provider: provider.to_string(),
            model: model.map(String::from),
            failure_type,
            error_message: error_message.to_string(),
            request_type: request_type.to_string(),
            isolation_triggered: false,
        };

        tracing::warn!(
            provider = %provider,
            model = model.unwrap_or("-"),
            failure_type = %failure_type,
            error = %error_message,
            "Recorded provider failure"
        );

        {
            let mut entry = self.isolation.entry(provider.to_string()).or_default();
            let entry = entry.value_mut();
            entry.status.failure_count += 1;
            entry.status.last_failure = Some(now);
            entry.recent.push_back(now);
            while entry.recent.front().is_some_and(|t| *t < window_start) {
                entry.recent.pop_front();
            }

            let recent = entry.recent.len();
            if !entry.status.isolated
                && entry.status.failure_count >= threshold
                && recent >= threshold as usize
            {
                let reason = format!("Too many recent failures: {recent}");
                isolate(&mut entry.status, &reason, now, config.recovery_check_interval());
                event.isolation_triggered = true;
                tracing::warn!(provider = %provider, %reason, "Provider isolated");
            }
        }

        let mut history = self.history.lock().expect("failure history lock poisoned");
        history.push_back(event.clone());
        while history.len() > config.failure_history_capacity {
            history.pop_front();
        }

        event
    }

    /// Whether `provider` is currently excluded from selection.
    ///
    /// Once the isolation duration has elapsed this performs a single
    /// recovery check and reports the post-check state.
    pub fn is_provider_isolated(&self, provider: &str) -> bool {
        let Some(mut entry) = self.isolation.get_mut(provider) else {
            return false;
        };
        if !entry.status.isolated {
            return false;
        }

        let config = self.config.current();
        let now = Utc::now();
        let Some(isolated_at) = entry.status.isolation_timestamp else {
            return true;
        };
        if now < after(isolated_at, config.isolation_duration()) {
            return true;
        }

        let due = entry.status.next_recovery_check.is_none_or(|t| now >= t);
        if due {
            self.attempt_recovery(provider, entry.value_mut(), now);
        }
        entry.status.isolated
    }

    /// Ask the registry whether an isolated provider is healthy again.
    ///
    /// Returns `true` if the provider is (now) not isolated. Lookup errors
    /// count as "still unhealthy".
    pub fn recover_provider(&self, provider: &str) -> bool {
        let Some(mut entry) = self.isolation.get_mut(provider) else {
            return true;
        };
        if !entry.status.isolated {
            return true;
        }
        self.attempt_recovery(provider, entry.value_mut(), Utc::now())
    }

    /// Administrative isolation; same effect as automatic isolation.
    pub fn isolate_provider(&self, provider: &str, reason: &str) {
        let interval = self.config.current().recovery_check_interval();
        let mut entry = self.isolation.entry(provider.to_string()).or_default();
        isolate(&mut entry.value_mut().status, reason, Utc::now(), interval);
        tracing::warn!(provider = %provider, %reason, "Provider isolated");
    }

    /// Record a successful call, feeding the response-time history.
    pub fn record_success(&self, provider: &str, latency: Duration) {
        self.performance.record(provider, latency);
    }

    pub fn performance(&self) -> &PerformanceTracker {
        &self.performance
    }

    /// Snapshot of one provider's isolation status.
    pub fn isolation_status(&self, provider: &str) -> Option<ProviderIsolationStatus> {
        self.isolation.get(provider).map(|e| e.status.clone())
    }

    /// Total failures ever recorded for `provider`.
    pub fn failure_count(&self, provider: &str) -> u32 {
        self.isolation
            .get(provider)
            .map(|e| e.status.failure_count)
            .unwrap_or(0)
    }

    /// Providers currently flagged isolated, sorted by name.
    ///
    /// Reads the flag only; no recovery checks are triggered.
    pub fn isolated_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .isolation
            .iter()
            .filter(|e| e.status.isolated)
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Most recent failure events, newest last.
    pub fn recent_failures(&self, limit: usize) -> Vec<FailureEvent> {
        let history = self.history.lock().expect("failure history lock poisoned");
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Aggregate the retained history, optionally for one provider and/or
    /// only events within `window` of now.
    pub fn failure_statistics(
        &self,
        provider: Option<&str>,
        window: Option<Duration>,
    ) -> FailureStatistics {
        let cutoff = window.map(|w| before(Utc::now(), w));
        let relevant: Vec<FailureEvent> = {
            let history = self.history.lock().expect("failure history lock poisoned");
            history
                .iter()
                .filter(|e| cutoff.is_none_or(|c| e.timestamp >= c))
                .filter(|e| provider.is_none_or(|p| e.provider == p))
                .cloned()
                .collect()
        };

        let mut stats = FailureStatistics {
            total_failures: relevant.len(),
            time_window: window
                .map(|w| format!("{}s", w.as_secs()))
                .unwrap_or_else(|| "all_time".to_string()),
            isolated_providers: self.isolated_providers(),
            ..Default::default()
        };

        for event in &relevant {
            let kind = event.failure_type.as_str().to_string();
            *stats.failure_types.entry(kind.clone()).or_default() += 1;

            let per_provider: &mut ProviderFailureStats =
                stats.providers.entry(event.provider.clone()).or_default();
            per_provider.count += 1;
            *per_provider.failure_types.entry(kind).or_default() += 1;

            if let Some(model) = &event.model {
                *stats
                    .models
                    .entry(format!("{}:{model}", event.provider))
                    .or_default() += 1;
            }
        }

        stats
    }

    /// Failure counts per provider, for display.
    pub fn failure_counts(&self) -> BTreeMap<String, u32> {
        self.isolation
            .iter()
            .map(|e| (e.key().clone(), e.status.failure_count))
            .collect()
    }

    fn attempt_recovery(&self, provider: &str, entry: &mut IsolationEntry, now: DateTime<Utc>) -> bool {
        let started = Instant::now();
        tracing::info!(provider = %provider, "Attempting provider recovery");
        entry.status.recovery_attempts += 1;

        let healthy = match self.registry.health_status(provider) {
            Ok(Some(report)) => report.is_healthy(),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(
                    provider = %provider,
                    error = %err,
                    "Health lookup failed during recovery, keeping provider isolated"
                );
                false
            }
        };

        if healthy {
            entry.status.isolated = false;
            entry.status.isolation_reason = None;
            entry.status.isolation_timestamp = None;
            entry.status.next_recovery_check = None;
            entry.recent.clear();
            tracing::info!(
                provider = %provider,
                attempts = entry.status.recovery_attempts,
                elapsed_us = started.elapsed().as_micros() as u64,
                "Provider recovered"
            );
            true
        } else {
            let interval = self.config.current().recovery_check_interval();
            entry.status.next_recovery_check = Some(after(now, interval));
            tracing::debug!(provider = %provider, "Provider still unhealthy, keeping isolated");
            false
        }
    }
}

impl std::fmt::Debug for FailureLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureLedger")
            .field("tracked_providers", &self.isolation.len())
            .field("isolated", &self.isolated_providers())
            .finish()
    }
}

fn isolate(status: &mut ProviderIsolationStatus, reason: &str, now: DateTime<Utc>, interval: Duration) {
    status.isolated = true;
    status.isolation_reason = Some(reason.to_string());
    status.isolation_timestamp = Some(now);
    status.next_recovery_check = Some(after(now, interval));
}

fn after(ts: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|delta| ts.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn before(ts: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|delta| ts.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
