//! The router context object.
//!
//! Owns every routing component and is constructed once at startup, then
//! shared by reference (usually behind an `Arc`) with request handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use routewise_types::capability::{CapabilityFallbackResult, CapabilityRequirement};
use routewise_types::config::RouterConfig;
use routewise_types::error::{ConfigError, RouterError};
use routewise_types::failure::{FailureEvent, FailureStatistics, FailureType};
use routewise_types::provider::GenerateOptions;
use routewise_types::response::{GeneratedResponse, RouteResponse};
use routewise_types::selection::{SelectionResult, UserPreference};

use crate::config::SharedConfig;
use crate::invocation::degraded::{
    DegradedCause, DegradedContext, DegradedResponder, StaticDegradedResponder, degraded_response,
};
use crate::invocation::invoker::{InvocationError, Invoker};
use crate::isolation::ledger::FailureLedger;
use crate::provider::health::HealthMonitor;
use crate::provider::registry::Registry;
use crate::selection::fallback::ModelFallbackResolver;
use crate::selection::planner::CapabilityPlanner;
use crate::selection::preference::{normalize_provider_name, validate_preference};
use crate::selection::selector::ProviderSelector;

/// Annotation attached to responses produced after a generation failure.
pub const LLM_FALLBACK_ANNOTATION: &str = "LLM Fallback";

/// Fallback reason when selection found no provider at all.
pub const REASON_ALL_ISOLATED: &str = "all_providers_isolated";

/// Fallback reason when every provider in the invocation chain failed.
pub const REASON_GENERATION_FAILED: &str = "llm_generation_failed";

/// One inbound inference request.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub prompt: String,
    pub preference: UserPreference,
    pub requirement: CapabilityRequirement,
    pub options: GenerateOptions,
}

impl RouteRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_preference(mut self, preference: UserPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_requirement(mut self, requirement: CapabilityRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

pub struct Router<D = StaticDegradedResponder> {
    registry: Arc<dyn Registry>,
    config: SharedConfig,
    ledger: Arc<FailureLedger>,
    resolver: Arc<ModelFallbackResolver>,
    planner: Arc<CapabilityPlanner>,
    selector: ProviderSelector,
    invoker: Invoker,
    responder: D,
}

impl Router<StaticDegradedResponder> {
    pub fn new(registry: Arc<dyn Registry>, config: RouterConfig) -> Self {
        Self::with_responder(registry, config, StaticDegradedResponder)
    }
}

impl<D: DegradedResponder> Router<D> {
    pub fn with_responder(registry: Arc<dyn Registry>, config: RouterConfig, responder: D) -> Self {
        let config = SharedConfig::new(config);
        let ledger = Arc::new(FailureLedger::new(registry.clone(), config.clone()));
        let resolver = Arc::new(ModelFallbackResolver::new(registry.clone(), config.clone()));
        let planner = Arc::new(CapabilityPlanner::new(registry.clone(), ledger.clone()));
        let selector = ProviderSelector::new(
            registry.clone(),
            config.clone(),
            ledger.clone(),
            resolver.clone(),
            planner.clone(),
        );
        let invoker = Invoker::new(registry.clone(), config.clone(), ledger.clone(), resolver.clone());

        Self {
            registry,
            config,
            ledger,
            resolver,
            planner,
            selector,
            invoker,
            responder,
        }
    }

    pub fn config(&self) -> Arc<RouterConfig> {
        self.config.current()
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &ModelFallbackResolver {
        &self.resolver
    }

    pub fn planner(&self) -> &CapabilityPlanner {
        &self.planner
    }

    /// Health monitor writing into this router's registry.
    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(self.registry.clone(), self.config.clone())
    }

    /// Swap in a new configuration and drop the lazily built caches.
    ///
    /// Isolation state and failure history survive the reload.
    pub fn apply_config(&self, config: RouterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config.replace(config);
        self.resolver.clear();
        self.planner.clear_cache();
        tracing::info!("Router configuration reloaded");
        Ok(())
    }

    pub fn validate_preference(&self, preference: &UserPreference) -> Result<UserPreference, RouterError> {
        let config = self.config.current();
        validate_preference(preference, self.registry.as_ref(), &config.preference_validation)
    }

    /// Run selection only; nothing is invoked.
    ///
    /// An empty registry is not an error: selection runs through to
    /// degraded mode like any other exhausted hierarchy.
    pub fn dry_run(&self, request: &RouteRequest) -> Result<SelectionResult, RouterError> {
        let preference = self.validate_preference(&request.preference)?;
        Ok(self.selector.select(&preference, &request.requirement))
    }

    /// Validate, select, invoke, and fall back to a degraded response.
    ///
    /// Only cancellation and an invalid preference (when fallback on invalid
    /// input is disabled) surface as errors. Missing or failing providers
    /// always end in a response.
    pub async fn route(&self, request: &RouteRequest, cancel: &CancellationToken) -> Result<RouteResponse, RouterError> {
        let selection = self.dry_run(request)?;

        let Some(selected) = selection.provider.clone() else {
            let config = self.config.current();
            let mut failed = config.default_hierarchy.clone();
            if let Some(preferred) = request.preference.provider.as_deref().map(normalize_provider_name) {
                if !failed.contains(&preferred) {
                    failed.insert(0, preferred);
                }
            }
            if !failed.contains(&config.hard_final_fallback.provider) {
                failed.push(config.hard_final_fallback.provider.clone());
            }

            let content = self
                .responder
                .respond(&DegradedContext {
                    prompt: &request.prompt,
                    cause: DegradedCause::AllProvidersFailed,
                    failed_providers: &failed,
                })
                .await;
            return Ok(RouteResponse::Degraded(degraded_response(content, REASON_ALL_ISOLATED, failed)));
        };

        match self
            .invoker
            .invoke(&selection, &request.prompt, &request.options, cancel)
            .await
        {
            Ok(outcome) => Ok(RouteResponse::Generated(GeneratedResponse {
                text: outcome.output.text,
                provider: outcome.provider,
                model: outcome.model,
                usage: outcome.output.usage,
                latency_ms: outcome.latency.as_secs_f64() * 1000.0,
                selection,
                failed_attempts: outcome.failed_attempts.into_iter().map(|a| a.provider).collect(),
            })),
            Err(InvocationError::Cancelled) => Err(RouterError::Cancelled),
            Err(err) => {
                let cause = DegradedCause::infer(err.attempts());
                let router_err = RouterError::from(err);
                let attempted = match &router_err {
                    RouterError::GenerationFailed { attempted, .. } => attempted.clone(),
                    _ => Vec::new(),
                };
                tracing::warn!(
                    provider = %selected,
                    cause = cause.as_str(),
                    error = %router_err,
                    "Generation failed across the chain, returning degraded response"
                );

                let content = self
                    .responder
                    .respond(&DegradedContext {
                        prompt: &request.prompt,
                        cause,
                        failed_providers: &attempted,
                    })
                    .await;
                let mut response = degraded_response(content, REASON_GENERATION_FAILED, attempted);
                response.annotations.push(LLM_FALLBACK_ANNOTATION.to_string());
                response.failed_provider = Some(selected);
                response.error = Some(router_err.to_string());
                Ok(RouteResponse::Degraded(response))
            }
        }
    }

    /// Feedback entry point for failures observed outside the router.
    pub fn record_failure(
        &self,
        provider: &str,
        model: Option<&str>,
        failure_type: FailureType,
        message: &str,
        request_type: &str,
    ) -> FailureEvent {
        let event = self
            .ledger
            .record_failure(provider, model, failure_type, message, request_type);
        if let Some(model) = model {
            self.resolver.record_model_failure(provider, model);
        }
        event
    }

    /// Feedback entry point for successes observed outside the router.
    pub fn record_success(&self, provider: &str, model: Option<&str>, latency: Duration) {
        self.ledger.record_success(provider, latency);
        if let Some(model) = model {
            self.resolver.record_model_success(provider, model);
        }
    }

    pub fn isolate_provider(&self, provider: &str, reason: &str) {
        self.ledger.isolate_provider(provider, reason);
    }

    pub fn is_provider_isolated(&self, provider: &str) -> bool {
        self.ledger.is_provider_isolated(provider)
    }

    pub fn recover_provider(&self, provider: &str) -> bool {
        self.ledger.recover_provider(provider)
    }

    pub fn failure_statistics(&self, provider: Option<&str>, window: Option<Duration>) -> FailureStatistics {
        self.ledger.failure_statistics(provider, window)
    }

    pub fn fallback_chain(&self, provider: &str, primary_model: &str) -> Vec<String> {
        self.resolver.fallback_chain(provider, primary_model)
    }

    pub fn attempt_capability_fallback(
        &self,
        requirement: &CapabilityRequirement,
        exclude: Option<&str>,
    ) -> CapabilityFallbackResult {
        self.planner.attempt_capability_fallback(requirement, exclude)
    }
}
