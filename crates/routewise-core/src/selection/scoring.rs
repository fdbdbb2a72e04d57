//! Additive provider scoring.
//!
//! Scores are unbounded heuristics: health, matched capabilities, a failure
//! penalty and a response-time bonus. Only their ordering matters.

use std::sync::Arc;

use serde::Serialize;

use routewise_types::capability::CapabilityRequirement;
use routewise_types::provider::HealthStatus;

use super::capabilities::CapabilityCache;
use crate::isolation::ledger::FailureLedger;
use crate::provider::registry::Registry;

const HEALTHY_POINTS: f64 = 10.0;
const DEGRADED_POINTS: f64 = 5.0;
const REQUIRED_POINTS: f64 = 5.0;
const PREFERRED_POINTS: f64 = 2.0;
const FAILURE_PENALTY: f64 = 0.5;
const RESPONSE_TIME_CEILING_SECS: f64 = 5.0;

/// Per-component score for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderScore {
    pub provider: String,
    pub health: f64,
    pub required: f64,
    pub preferred: f64,
    pub failure_penalty: f64,
    pub performance: f64,
}

impl ProviderScore {
    pub fn total(&self) -> f64 {
        self.health + self.required + self.preferred - self.failure_penalty + self.performance
    }
}

pub struct ProviderScorer {
    registry: Arc<dyn Registry>,
    ledger: Arc<FailureLedger>,
    capabilities: Arc<CapabilityCache>,
}

impl ProviderScorer {
    pub fn new(registry: Arc<dyn Registry>, ledger: Arc<FailureLedger>, capabilities: Arc<CapabilityCache>) -> Self {
        Self {
            registry,
            ledger,
            capabilities,
        }
    }

    pub fn score_provider(&self, provider: &str, requirement: &CapabilityRequirement) -> ProviderScore {
        let health = match self.registry.health_status(provider) {
            Ok(Some(report)) => match report.status {
                HealthStatus::Healthy => HEALTHY_POINTS,
                HealthStatus::Degraded => DEGRADED_POINTS,
                _ => 0.0,
            },
            _ => 0.0,
        };

        let capabilities = self.capabilities.get(provider);
        let matched_required = requirement.required.intersection(&capabilities).count();
        let matched_preferred = requirement.preferred.intersection(&capabilities).count();

        let performance = self
            .ledger
            .performance()
            .avg_response_secs(provider)
            .map(|avg| (RESPONSE_TIME_CEILING_SECS - avg).max(0.0))
            .unwrap_or(0.0);

        ProviderScore {
            provider: provider.to_string(),
            health,
            required: matched_required as f64 * REQUIRED_POINTS,
            preferred: matched_preferred as f64 * PREFERRED_POINTS,
            failure_penalty: f64::from(self.ledger.failure_count(provider)) * FAILURE_PENALTY,
            performance,
        }
    }

    /// Highest-scoring candidate. Ties keep the earlier candidate, so callers
    /// pass candidates in registry order.
    pub fn select_best(&self, candidates: &[String], requirement: &CapabilityRequirement) -> Option<String> {
        if candidates.len() <= 1 {
            return candidates.first().cloned();
        }

        let mut best: Option<(f64, &String)> = None;
        for candidate in candidates {
            let score = self.score_provider(candidate, requirement).total();
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, name)| name.clone())
    }
}
