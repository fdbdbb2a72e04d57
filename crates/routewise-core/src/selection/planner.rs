//! Capability degradation planner.
//!
//! When no provider satisfies every required capability, requirements are
//! relaxed one at a time in a fixed order (streaming first, multimodal last).
//! Each relaxation drops a single capability; if none of them finds a
//! provider the attempt fails.

use std::collections::BTreeSet;
use std::sync::Arc;

use routewise_types::capability::{CapabilityFallbackResult, CapabilityRequirement, CapabilityType};
use routewise_types::provider::HealthStatus;

use super::capabilities::CapabilityCache;
use super::scoring::ProviderScorer;
use crate::isolation::ledger::FailureLedger;
use crate::provider::registry::Registry;

/// Relaxation order and the reason reported for each step.
pub const DEGRADATION_ORDER: [(CapabilityType, &str); 4] = [
    (CapabilityType::Streaming, "Fallback to non-streaming response"),
    (CapabilityType::FunctionCalling, "Fallback to text-only response"),
    (CapabilityType::Vision, "Fallback to text-only processing"),
    (CapabilityType::Multimodal, "Fallback to single-modal processing"),
];

/// Why a provider can or cannot serve a requirement right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unregistered,
    NotLlm,
    Unhealthy,
    Isolated,
    MissingCapabilities,
}

impl Availability {
    pub fn is_available(self) -> bool {
        self == Availability::Available
    }
}

pub struct CapabilityPlanner {
    registry: Arc<dyn Registry>,
    ledger: Arc<FailureLedger>,
    scorer: ProviderScorer,
    capabilities: Arc<CapabilityCache>,
}

impl CapabilityPlanner {
    pub fn new(registry: Arc<dyn Registry>, ledger: Arc<FailureLedger>) -> Self {
        let capabilities = Arc::new(CapabilityCache::new(registry.clone()));
        let scorer = ProviderScorer::new(registry.clone(), ledger.clone(), capabilities.clone());
        Self {
            registry,
            ledger,
            scorer,
            capabilities,
        }
    }

    pub fn scorer(&self) -> &ProviderScorer {
        &self.scorer
    }

    /// Declared capabilities of `provider`, cached after the first lookup.
    ///
    /// A provider without a spec is assumed to stream and nothing else.
    pub fn provider_capabilities(&self, provider: &str) -> BTreeSet<CapabilityType> {
        self.capabilities.get(provider)
    }

    /// Check a provider against a requirement.
    ///
    /// The isolation check runs last since it may trigger a recovery attempt.
    pub fn availability(&self, provider: &str, requirement: &CapabilityRequirement) -> Availability {
        let Some(spec) = self.registry.provider_spec(provider) else {
            return Availability::Unregistered;
        };
        if !spec.is_llm_provider {
            return Availability::NotLlm;
        }
        if !requirement.is_satisfied_by(&self.provider_capabilities(provider)) {
            return Availability::MissingCapabilities;
        }
        match self.registry.health_status(provider) {
            Ok(Some(report)) if report.status == HealthStatus::Unhealthy => {
                return Availability::Unhealthy;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(provider = %provider, error = %err, "Health lookup failed");
                return Availability::Unhealthy;
            }
        }
        if self.ledger.is_provider_isolated(provider) {
            return Availability::Isolated;
        }
        Availability::Available
    }

    /// Available providers for `requirement`, in registry order.
    pub fn candidates(
        &self,
        requirement: &CapabilityRequirement,
        exclude: Option<&str>,
        within: Option<&[String]>,
    ) -> Vec<String> {
        self.registry
            .list_providers(true)
            .into_iter()
            .filter(|p| exclude != Some(p.as_str()))
            .filter(|p| within.is_none_or(|w| w.contains(p)))
            .filter(|p| self.availability(p, requirement).is_available())
            .collect()
    }

    /// Find the best provider for `requirement`, relaxing capabilities if
    /// nothing satisfies it as given.
    pub fn attempt_capability_fallback(
        &self,
        requirement: &CapabilityRequirement,
        exclude: Option<&str>,
    ) -> CapabilityFallbackResult {
        self.attempt_within(requirement, exclude, None)
    }

    /// Like [`attempt_capability_fallback`](Self::attempt_capability_fallback),
    /// restricted to the providers in `within`.
    pub fn attempt_within(
        &self,
        requirement: &CapabilityRequirement,
        exclude: Option<&str>,
        within: Option<&[String]>,
    ) -> CapabilityFallbackResult {
        let original = requirement.required.clone();

        if let Some(result) = self.try_requirement(requirement, &original, exclude, within, None) {
            return result;
        }

        let degradable = DEGRADATION_ORDER
            .into_iter()
            .filter(|(cap, _)| original.contains(cap));

        for (cap, reason) in degradable {
            let relaxed = requirement.relax(cap);
            if let Some(result) = self.try_requirement(&relaxed, &original, exclude, within, Some(reason.to_string())) {
                return result;
            }
        }

        tracing::info!(
            required = ?original,
            "No provider available even after capability degradation"
        );
        CapabilityFallbackResult {
            success: false,
            achieved_capabilities: BTreeSet::new(),
            degraded_capabilities: original.clone(),
            original_capabilities: original,
            provider: None,
            model: None,
            fallback_reason: Some("No providers available for required capabilities".to_string()),
        }
    }

    /// Drop cached capability sets; used on config reload.
    pub fn clear_cache(&self) {
        self.capabilities.clear();
    }

    fn try_requirement(
        &self,
        requirement: &CapabilityRequirement,
        original: &BTreeSet<CapabilityType>,
        exclude: Option<&str>,
        within: Option<&[String]>,
        reason: Option<String>,
    ) -> Option<CapabilityFallbackResult> {
        let candidates = self.candidates(requirement, exclude, within);
        let provider = self.scorer.select_best(&candidates, requirement)?;
        let model = self
            .registry
            .provider_spec(&provider)
            .and_then(|s| s.default_model);

        let degraded: BTreeSet<CapabilityType> =
            original.difference(&requirement.required).copied().collect();
        if !degraded.is_empty() {
            tracing::info!(
                provider = %provider,
                degraded = ?degraded,
                reason = reason.as_deref().unwrap_or("-"),
                "Capabilities degraded to find a provider"
            );
        }

        Some(CapabilityFallbackResult {
            success: true,
            original_capabilities: original.clone(),
            achieved_capabilities: requirement.required.clone(),
            degraded_capabilities: degraded,
            provider: Some(provider),
            model,
            fallback_reason: reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewise_types::provider::{HealthReport, ProviderSpec};

    use crate::config::SharedConfig;
    use crate::provider::registry::ProviderRegistry;

    use CapabilityType::*;

    fn setup(providers: &[(&str, &[CapabilityType])]) -> (Arc<ProviderRegistry>, Arc<FailureLedger>, CapabilityPlanner) {
        let registry = Arc::new(ProviderRegistry::new());
        for (name, caps) in providers {
            registry.register(
                ProviderSpec::new(*name).with_capabilities(caps.iter().copied()),
                vec![],
            );
        }
        let ledger = Arc::new(FailureLedger::new(registry.clone(), SharedConfig::default()));
        let planner = CapabilityPlanner::new(registry.clone(), ledger.clone());
        (registry, ledger, planner)
    }

    #[test]
    fn full_match_needs_no_degradation() {
        let (_, _, planner) = setup(&[("openai", &[Streaming, Vision])]);
        let result = planner.attempt_capability_fallback(&CapabilityRequirement::requiring([Streaming, Vision]), None);

        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("openai"));
        assert!(result.degraded_capabilities.is_empty());
        assert!(result.fallback_reason.is_none());
    }

    #[test]
    fn streaming_is_dropped_before_vision() {
        // "vision-only" satisfies the requirement once streaming is dropped,
        // "stream-only" once vision is dropped.
        let (_, _, planner) = setup(&[("stream-only", &[Streaming]), ("vision-only", &[Vision])]);
        let result = planner.attempt_capability_fallback(&CapabilityRequirement::requiring([Streaming, Vision]), None);

        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("vision-only"));
        assert_eq!(result.degraded_capabilities, BTreeSet::from([Streaming]));
        assert_eq!(result.achieved_capabilities, BTreeSet::from([Vision]));
        assert_eq!(result.fallback_reason.as_deref(), Some("Fallback to non-streaming response"));
    }

    #[test]
    fn vision_dropped_when_streaming_alone_does_not_help() {
        let (_, _, planner) = setup(&[("stream-only", &[Streaming])]);
        let result = planner.attempt_capability_fallback(&CapabilityRequirement::requiring([Streaming, Vision]), None);

        assert_eq!(result.provider.as_deref(), Some("stream-only"));
        assert_eq!(result.degraded_capabilities, BTreeSet::from([Vision]));
        assert_eq!(result.fallback_reason.as_deref(), Some("Fallback to text-only processing"));
    }

    #[test]
    fn only_single_relaxations_are_tried() {
        let (_, _, planner) = setup(&[("plain", &[])]);
        let result = planner.attempt_capability_fallback(
            &CapabilityRequirement::requiring([Streaming, FunctionCalling]),
            None,
        );

        assert!(!result.success);
        assert!(result.provider.is_none());
        assert!(result.achieved_capabilities.is_empty());
        assert_eq!(result.degraded_capabilities, BTreeSet::from([Streaming, FunctionCalling]));
    }

    #[test]
    fn provider_lacking_two_required_capabilities_is_not_chosen() {
        let (_, _, planner) = setup(&[("plain", &[])]);
        let result = planner.attempt_capability_fallback(&CapabilityRequirement::requiring([Streaming, Vision]), None);

        assert!(!result.success);
        assert!(result.achieved_capabilities.is_empty());
        assert_eq!(result.degraded_capabilities, BTreeSet::from([Streaming, Vision]));
    }

    #[test]
    fn scorer_sees_cached_capabilities() {
        let (registry, _, planner) = setup(&[("openai", &[Vision])]);
        let req = CapabilityRequirement::requiring([Vision]);
        assert!(planner.availability("openai", &req).is_available());

        // Re-registration without a reload keeps the cached set for both.
        registry.register(ProviderSpec::new("openai"), vec![]);
        assert!(planner.availability("openai", &req).is_available());
        assert_eq!(planner.scorer().score_provider("openai", &req).required, 5.0);

        planner.clear_cache();
        assert_eq!(
            planner.availability("openai", &req),
            Availability::MissingCapabilities
        );
        assert_eq!(planner.scorer().score_provider("openai", &req).required, 0.0);
    }

    #[test]
    fn non_degradable_requirement_fails() {
        let (_, _, planner) = setup(&[("plain", &[Streaming])]);
        let result = planner.attempt_capability_fallback(&CapabilityRequirement::requiring([Embeddings]), None);

        assert!(!result.success);
        assert!(result.provider.is_none());
        assert!(result.achieved_capabilities.is_empty());
        assert_eq!(result.degraded_capabilities, BTreeSet::from([Embeddings]));
    }

    #[test]
    fn excluded_and_isolated_providers_are_skipped() {
        let (_, ledger, planner) = setup(&[("a", &[Streaming]), ("b", &[Streaming]), ("c", &[Streaming])]);
        ledger.isolate_provider("b", "maintenance");
        let req = CapabilityRequirement::requiring([Streaming]);

        assert_eq!(planner.candidates(&req, Some("a"), None), vec!["c"]);
        let result = planner.attempt_capability_fallback(&req, Some("a"));
        assert_eq!(result.provider.as_deref(), Some("c"));
    }

    #[test]
    fn unhealthy_providers_are_unavailable() {
        let (registry, _, planner) = setup(&[("a", &[])]);
        registry.set_health("a", HealthReport::unhealthy("down"));
        assert_eq!(
            planner.availability("a", &CapabilityRequirement::default()),
            Availability::Unhealthy
        );
        assert_eq!(
            planner.availability("ghost", &CapabilityRequirement::default()),
            Availability::Unregistered
        );
    }

    #[test]
    fn restricted_search_ignores_outside_providers() {
        let (_, _, planner) = setup(&[("outside", &[Vision]), ("inside", &[])]);
        let within = vec!["inside".to_string()];
        let result = planner.attempt_within(&CapabilityRequirement::requiring([Vision]), None, Some(within.as_slice()));

        assert_eq!(result.provider.as_deref(), Some("inside"));
        assert_eq!(result.degraded_capabilities, BTreeSet::from([Vision]));
    }

    #[test]
    fn unknown_provider_defaults_to_streaming() {
        let (_, _, planner) = setup(&[]);
        assert_eq!(planner.provider_capabilities("ghost"), BTreeSet::from([Streaming]));
    }
}
