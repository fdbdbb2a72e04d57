//! Provider chain invocation.
//!
//! The selected provider is tried first, then the rest of the default
//! hierarchy, then the hard final fallback, each at most once. A failure
//! never retries the same provider; it advances the chain.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use routewise_types::error::{ProviderError, RouterError};
use routewise_types::failure::FailureType;
use routewise_types::provider::{GenerateOptions, GenerationOutput};
use routewise_types::selection::SelectionResult;

use crate::config::SharedConfig;
use crate::isolation::ledger::FailureLedger;
use crate::provider::registry::Registry;
use crate::selection::fallback::ModelFallbackResolver;

/// One failed provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub provider: String,
    pub model: Option<String>,
    pub kind: FailureType,
    pub message: String,
}

/// A provider answered.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub provider: String,
    pub model: Option<String>,
    pub output: GenerationOutput,
    pub latency: Duration,
    pub failed_attempts: Vec<FailedAttempt>,
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("request cancelled")]
    Cancelled,

    #[error("all {} providers in chain failed", .attempts.len())]
    Exhausted { attempts: Vec<FailedAttempt> },
}

impl InvocationError {
    /// Failed attempts before the chain gave up.
    pub fn attempts(&self) -> &[FailedAttempt] {
        match self {
            InvocationError::Cancelled => &[],
            InvocationError::Exhausted { attempts } => attempts,
        }
    }
}

impl From<InvocationError> for RouterError {
    fn from(err: InvocationError) -> Self {
        match err {
            InvocationError::Cancelled => RouterError::Cancelled,
            InvocationError::Exhausted { attempts } => RouterError::GenerationFailed {
                last_error: attempts
                    .last()
                    .map(|a| format!("{}: {}", a.kind, a.message))
                    .unwrap_or_else(|| "no invocable provider in chain".to_string()),
                attempted: attempts.into_iter().map(|a| a.provider).collect(),
            },
        }
    }
}

pub struct Invoker {
    registry: Arc<dyn Registry>,
    config: SharedConfig,
    ledger: Arc<FailureLedger>,
    resolver: Arc<ModelFallbackResolver>,
}

impl Invoker {
    pub fn new(
        registry: Arc<dyn Registry>,
        config: SharedConfig,
        ledger: Arc<FailureLedger>,
        resolver: Arc<ModelFallbackResolver>,
    ) -> Self {
        Self {
            registry,
            config,
            ledger,
            resolver,
        }
    }

    /// Providers to try, in order, starting from `selected`. No duplicates.
    pub fn provider_chain(&self, selected: &str) -> Vec<String> {
        let config = self.config.current();
        let mut chain = vec![selected.to_string()];
        for name in config
            .default_hierarchy
            .iter()
            .chain(std::iter::once(&config.hard_final_fallback.provider))
        {
            if !chain.contains(name) {
                chain.push(name.clone());
            }
        }
        chain
    }

    /// Generate `prompt` starting from the selected provider.
    ///
    /// Each call is bounded by the validation timeout. Cancellation is
    /// checked before every candidate and raced against the in-flight call,
    /// whose future is dropped when the token fires.
    pub async fn invoke(
        &self,
        selection: &SelectionResult,
        prompt: &str,
        options: &GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        let Some(selected) = selection.provider.as_deref() else {
            return Err(InvocationError::Exhausted { attempts: Vec::new() });
        };

        let span = tracing::info_span!(
            "routing.invoke",
            routing.provider = %selected,
            routing.model = selection.model.as_deref().unwrap_or("-"),
            routing.selection_path = selection.selection_path.as_str(),
        );

        self.walk_chain(selected, selection.model.clone(), prompt, options, cancel)
            .instrument(span)
            .await
    }

    async fn walk_chain(
        &self,
        selected: &str,
        selected_model: Option<String>,
        prompt: &str,
        options: &GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        let timeout = self.config.current().validation_timeout();
        let chain = self.provider_chain(selected);
        let mut attempts: Vec<FailedAttempt> = Vec::new();

        for (position, provider) in chain.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(provider = %provider, "Request cancelled, stopping provider chain");
                return Err(InvocationError::Cancelled);
            }

            let model = if position == 0 {
                selected_model.clone()
            } else {
                if self.registry.provider_spec(provider).is_none() {
                    tracing::debug!(provider = %provider, "Chain provider not registered, skipping");
                    continue;
                }
                if self.ledger.is_provider_isolated(provider) {
                    tracing::debug!(provider = %provider, "Chain provider isolated, skipping");
                    continue;
                }
                self.default_model(provider)
            };

            let Some(handle) = self.registry.provider(provider) else {
                let err = ProviderError::new(
                    FailureType::ProviderUnavailable,
                    "no invocable backend registered",
                );
                attempts.push(self.report_failure(provider, model, err, &options.request_type));
                continue;
            };

            let started = Instant::now();
            let call = tokio::time::timeout(timeout, handle.generate(prompt, model.as_deref(), options));
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(provider = %provider, "Request cancelled during provider call");
                    return Err(InvocationError::Cancelled);
                }
                result = call => result,
            };

            match result {
                Ok(Ok(output)) => {
                    let latency = started.elapsed();
                    self.ledger.record_success(provider, latency);
                    if let Some(model) = model.as_deref() {
                        self.resolver.record_model_success(provider, model);
                    }
                    if position > 0 {
                        tracing::info!(
                            provider = %provider,
                            failed = attempts.len(),
                            "Request served by fallback provider"
                        );
                    }
                    return Ok(InvocationOutcome {
                        provider: provider.clone(),
                        model,
                        output,
                        latency,
                        failed_attempts: attempts,
                    });
                }
                Ok(Err(err)) => {
                    attempts.push(self.report_failure(provider, model, err, &options.request_type));
                }
                Err(_) => {
                    let err = ProviderError::timeout(timeout.as_millis());
                    attempts.push(self.report_failure(provider, model, err, &options.request_type));
                }
            }
        }

        tracing::error!(
            attempted = attempts.len(),
            chain = ?chain,
            "All providers in chain failed"
        );
        Err(InvocationError::Exhausted { attempts })
    }

    fn default_model(&self, provider: &str) -> Option<String> {
        let config = self.config.current();
        let primary = if provider == config.hard_final_fallback.provider {
            Some(config.hard_final_fallback.model.clone())
        } else {
            self.registry.provider_spec(provider).and_then(|s| s.default_model)
        }?;
        Some(self.resolver.viable_model(provider, &primary))
    }

    fn report_failure(
        &self,
        provider: &str,
        model: Option<String>,
        err: ProviderError,
        request_type: &str,
    ) -> FailedAttempt {
        tracing::warn!(
            provider = %provider,
            error = %err,
            "Provider failed, trying next in chain"
        );
        self.ledger
            .record_failure(provider, model.as_deref(), err.kind, &err.message, request_type);
        if let Some(model) = model.as_deref() {
            self.resolver.record_model_failure(provider, model);
        }
        FailedAttempt {
            provider: provider.to_string(),
            model,
            kind: err.kind,
            message: err.message,
        }
    }
}
