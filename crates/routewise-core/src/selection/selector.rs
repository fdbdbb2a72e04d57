//! Four-step provider selection.
//!
//! 1. user preference
//! 2. system default hierarchy (with capability degradation as a last try)
//! 3. hard final fallback, regardless of health signals
//! 4. degraded mode (`provider == None`)
//!
//! Every miss increments both `fallback_attempts` and
//! `health_checks_performed`, so a full exhaustion reports at least
//! `hierarchy.len() + 2` attempts.

use std::sync::Arc;
use std::time::Instant;

use tracing::field::Empty;

use routewise_types::capability::CapabilityRequirement;
use routewise_types::selection::{SelectionPath, SelectionResult, UserPreference};

use super::fallback::ModelFallbackResolver;
use super::planner::{Availability, CapabilityPlanner};
use crate::config::SharedConfig;
use crate::isolation::ledger::FailureLedger;
use crate::provider::registry::Registry;

pub struct ProviderSelector {
    registry: Arc<dyn Registry>,
    config: SharedConfig,
    ledger: Arc<FailureLedger>,
    resolver: Arc<ModelFallbackResolver>,
    planner: Arc<CapabilityPlanner>,
}

/// Attempt counters carried across the four steps.
struct Tally {
    started: Instant,
    fallback_attempts: u32,
    health_checks: u32,
}

impl Tally {
    fn check(&mut self) {
        self.health_checks += 1;
    }

    fn miss(&mut self) {
        self.fallback_attempts += 1;
    }

    fn finish(
        self,
        provider: Option<String>,
        model: Option<String>,
        path: SelectionPath,
        rationale: String,
    ) -> SelectionResult {
        SelectionResult {
            provider,
            model,
            rationale,
            selection_path: path,
            fallback_attempts: self.fallback_attempts,
            health_checks_performed: self.health_checks,
            total_selection_time_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            degraded_capabilities: Default::default(),
        }
    }
}

impl ProviderSelector {
    pub fn new(
        registry: Arc<dyn Registry>,
        config: SharedConfig,
        ledger: Arc<FailureLedger>,
        resolver: Arc<ModelFallbackResolver>,
        planner: Arc<CapabilityPlanner>,
    ) -> Self {
        Self {
            registry,
            config,
            ledger,
            resolver,
            planner,
        }
    }

    /// Pick a provider and model for a request.
    ///
    /// `preference` is expected to be validated already; an unknown provider
    /// in it is simply a step-1 miss.
    pub fn select(&self, preference: &UserPreference, requirement: &CapabilityRequirement) -> SelectionResult {
        let span = tracing::info_span!(
            "routing.select",
            routing.preferred_provider = preference.provider.as_deref().unwrap_or("-"),
            routing.provider = Empty,
            routing.selection_path = Empty,
            routing.fallback_attempts = Empty,
        );
        let _enter = span.enter();

        let result = self.run_steps(preference, requirement);

        span.record("routing.provider", result.provider.as_deref().unwrap_or("-"));
        span.record("routing.selection_path", result.selection_path.as_str());
        span.record("routing.fallback_attempts", result.fallback_attempts);

        if result.is_degraded_mode() {
            tracing::warn!(
                fallback_attempts = result.fallback_attempts,
                "No provider selectable, entering degraded mode"
            );
        } else {
            tracing::info!(
                provider = result.provider.as_deref().unwrap_or("-"),
                model = result.model.as_deref().unwrap_or("-"),
                path = %result.selection_path,
                fallback_attempts = result.fallback_attempts,
                elapsed_ms = result.total_selection_time_ms,
                "Provider selected"
            );
        }
        result
    }

    fn run_steps(&self, preference: &UserPreference, requirement: &CapabilityRequirement) -> SelectionResult {
        let config = self.config.current();
        let mut tally = Tally {
            started: Instant::now(),
            fallback_attempts: 0,
            health_checks: 0,
        };

        // Step 1: user preference.
        tally.check();
        if let Some(provider) = preference.provider.as_deref() {
            match self.planner.availability(provider, requirement) {
                Availability::Available => {
                    let model = self.choose_model(provider, preference.model.as_deref());
                    return tally.finish(
                        Some(provider.to_string()),
                        model,
                        SelectionPath::UserPreference,
                        format!("User preferred provider {provider} is available"),
                    );
                }
                reason => {
                    tracing::debug!(provider = %provider, ?reason, "Preferred provider skipped");
                }
            }
        }
        tally.miss();

        // Step 2: default hierarchy.
        let mut capability_misses = 0;
        for provider in &config.default_hierarchy {
            tally.check();
            match self.planner.availability(provider, requirement) {
                Availability::Available => {
                    let model = self.choose_model(provider, None);
                    return tally.finish(
                        Some(provider.clone()),
                        model,
                        SelectionPath::SystemDefault,
                        format!("First available provider in default hierarchy: {provider}"),
                    );
                }
                reason => {
                    if reason == Availability::MissingCapabilities {
                        capability_misses += 1;
                    }
                    tracing::debug!(provider = %provider, ?reason, "Hierarchy provider skipped");
                    tally.miss();
                }
            }
        }

        if capability_misses > 0 && !requirement.required.is_empty() {
            let fallback = self
                .planner
                .attempt_within(requirement, None, Some(config.default_hierarchy.as_slice()));
            if let Some(provider) = fallback.provider.filter(|_| fallback.success) {
                let model = self.choose_model(&provider, None);
                let mut result = tally.finish(
                    Some(provider.clone()),
                    model,
                    SelectionPath::SystemDefault,
                    format!(
                        "Default hierarchy provider {provider} with degraded capabilities: {}",
                        fallback.fallback_reason.as_deref().unwrap_or("capabilities relaxed")
                    ),
                );
                result.degraded_capabilities = fallback.degraded_capabilities;
                return result;
            }
        }

        // Step 3: hard final fallback. Health and capabilities are ignored.
        let hard = &config.hard_final_fallback;
        tally.check();
        if self.registry.provider_spec(&hard.provider).is_some()
            && !self.ledger.is_provider_isolated(&hard.provider)
        {
            let model = self.resolver.viable_model(&hard.provider, &hard.model);
            return tally.finish(
                Some(hard.provider.clone()),
                Some(model),
                SelectionPath::HardFallback,
                format!("Hard final fallback {}:{}", hard.provider, hard.model),
            );
        }
        tally.miss();

        // Step 4: degraded mode.
        tally.finish(
            None,
            None,
            SelectionPath::DegradedMode,
            "All providers unavailable, including the hard final fallback".to_string(),
        )
    }

    /// Requested model, else the provider default, steered away from models
    /// that have failed too often. `None` lets the provider pick.
    fn choose_model(&self, provider: &str, preferred: Option<&str>) -> Option<String> {
        let primary = preferred
            .map(String::from)
            .or_else(|| self.registry.provider_spec(provider).and_then(|s| s.default_model))?;
        Some(self.resolver.viable_model(provider, &primary))
    }
}
