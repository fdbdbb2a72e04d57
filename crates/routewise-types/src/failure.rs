//! Failure taxonomy, failure events, isolation status and failure statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of failure observed when invoking a provider.
///
/// All kinds count the same toward isolation; the kind is kept for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ProviderUnavailable,
    ModelUnavailable,
    CapabilityMissing,
    AuthenticationError,
    RateLimitError,
    NetworkError,
    TimeoutError,
    ResourceError,
    ConfigurationError,
}

impl FailureType {
    pub const ALL: [FailureType; 9] = [
        FailureType::ProviderUnavailable,
        FailureType::ModelUnavailable,
        FailureType::CapabilityMissing,
        FailureType::AuthenticationError,
        FailureType::RateLimitError,
        FailureType::NetworkError,
        FailureType::TimeoutError,
        FailureType::ResourceError,
        FailureType::ConfigurationError,
    ];

    /// Stable name used as the statistics key.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::ProviderUnavailable => "provider_unavailable",
            FailureType::ModelUnavailable => "model_unavailable",
            FailureType::CapabilityMissing => "capability_missing",
            FailureType::AuthenticationError => "authentication_error",
            FailureType::RateLimitError => "rate_limit_error",
            FailureType::NetworkError => "network_error",
            FailureType::TimeoutError => "timeout_error",
            FailureType::ResourceError => "resource_error",
            FailureType::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        FailureType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("invalid failure type: '{s}'"))
    }
}

/// Immutable record of one failed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: Option<String>,
    pub failure_type: FailureType,
    pub error_message: String,
    pub request_type: String,
    /// Set when this event tipped the provider into isolation.
    pub isolation_triggered: bool,
}

/// Isolation state for one provider.
///
/// `isolated == true` always comes with `isolation_timestamp == Some(_)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIsolationStatus {
    pub isolated: bool,
    pub isolation_reason: Option<String>,
    pub isolation_timestamp: Option<DateTime<Utc>>,
    pub failure_count: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub recovery_attempts: u32,
    pub next_recovery_check: Option<DateTime<Utc>>,
}

/// Failure counts for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailureStats {
    pub count: usize,
    pub failure_types: BTreeMap<String, usize>,
}

/// Aggregated view over the retained failure history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureStatistics {
    pub total_failures: usize,
    /// Keyed by [`FailureType::as_str`].
    pub failure_types: BTreeMap<String, usize>,
    pub providers: BTreeMap<String, ProviderFailureStats>,
    /// Keyed by `provider:model`.
    pub models: BTreeMap<String, usize>,
    /// Human-readable window, or `all_time`.
    pub time_window: String,
    pub isolated_providers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_type_roundtrip() {
        for kind in FailureType::ALL {
            let parsed: FailureType = kind.to_string().parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_failure_type_serde_matches_as_str() {
        for kind in FailureType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_isolation_status_default_is_healthy() {
        let status = ProviderIsolationStatus::default();
        assert!(!status.isolated);
        assert!(status.isolation_timestamp.is_none());
        assert_eq!(status.failure_count, 0);
    }
}
