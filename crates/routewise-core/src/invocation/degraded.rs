//! Degraded-mode response synthesis.
//!
//! The responder only writes the content. The router stamps on the routing
//! fields and guarantees the fixed recovery suggestions, so a custom
//! responder cannot drop them.

use std::future::Future;

use serde::Serialize;

use routewise_types::failure::FailureType;
use routewise_types::response::DegradedResponse;
use routewise_types::selection::SelectionPath;

use super::invoker::FailedAttempt;

/// Broad cause of degraded mode, inferred from the failures seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedCause {
    AllProvidersFailed,
    ApiRateLimits,
    NetworkIssues,
    ResourceExhaustion,
}

impl DegradedCause {
    /// Classify by the failure kinds of the attempts, most specific first.
    pub fn infer(attempts: &[FailedAttempt]) -> Self {
        let any = |kinds: &[FailureType]| attempts.iter().any(|a| kinds.contains(&a.kind));
        if any(&[FailureType::RateLimitError]) {
            DegradedCause::ApiRateLimits
        } else if any(&[FailureType::TimeoutError, FailureType::NetworkError]) {
            DegradedCause::NetworkIssues
        } else if any(&[FailureType::ResourceError]) {
            DegradedCause::ResourceExhaustion
        } else {
            DegradedCause::AllProvidersFailed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DegradedCause::AllProvidersFailed => "all_providers_failed",
            DegradedCause::ApiRateLimits => "api_rate_limits",
            DegradedCause::NetworkIssues => "network_issues",
            DegradedCause::ResourceExhaustion => "resource_exhaustion",
        }
    }
}

/// What the responder knows about the failed request.
#[derive(Debug, Clone)]
pub struct DegradedContext<'a> {
    pub prompt: &'a str,
    pub cause: DegradedCause,
    pub failed_providers: &'a [String],
}

/// External synthesizer boundary for degraded-mode responses.
pub trait DegradedResponder: Send + Sync {
    fn respond(&self, context: &DegradedContext<'_>) -> impl Future<Output = String> + Send;
}

/// Canned responses keyed by [`DegradedCause`].
#[derive(Debug, Clone, Default)]
pub struct StaticDegradedResponder;

impl StaticDegradedResponder {
    pub fn message(cause: DegradedCause) -> &'static str {
        match cause {
            DegradedCause::AllProvidersFailed => {
                "No language model provider is available right now, so this request could not be answered."
            }
            DegradedCause::ApiRateLimits => {
                "Language model providers are rate limiting requests right now, so this request could not be answered."
            }
            DegradedCause::NetworkIssues => {
                "Language model providers could not be reached in time, so this request could not be answered."
            }
            DegradedCause::ResourceExhaustion => {
                "Language model providers are out of capacity right now, so this request could not be answered."
            }
        }
    }
}

impl DegradedResponder for StaticDegradedResponder {
    fn respond(&self, context: &DegradedContext<'_>) -> impl Future<Output = String> + Send {
        let text = Self::message(context.cause).to_string();
        async move { text }
    }
}

/// Degraded response skeleton with the fixed suggestions filled in.
pub fn degraded_response(content: String, fallback_reason: &str, failed_providers: Vec<String>) -> DegradedResponse {
    let mut response = DegradedResponse {
        content,
        selection_path: SelectionPath::DegradedMode,
        suggestions: Vec::new(),
        annotations: Vec::new(),
        fallback_reason: fallback_reason.to_string(),
        failed_provider: None,
        error: None,
        failed_providers,
    };
    response.ensure_recovery_suggestions();
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewise_types::response::RECOVERY_SUGGESTIONS;

    fn attempt(kind: FailureType) -> FailedAttempt {
        FailedAttempt {
            provider: "p".to_string(),
            model: None,
            kind,
            message: String::new(),
        }
    }

    #[test]
    fn cause_inference_prefers_rate_limits() {
        assert_eq!(DegradedCause::infer(&[]), DegradedCause::AllProvidersFailed);
        assert_eq!(
            DegradedCause::infer(&[attempt(FailureType::TimeoutError), attempt(FailureType::RateLimitError)]),
            DegradedCause::ApiRateLimits
        );
        assert_eq!(
            DegradedCause::infer(&[attempt(FailureType::NetworkError)]),
            DegradedCause::NetworkIssues
        );
        assert_eq!(
            DegradedCause::infer(&[attempt(FailureType::ResourceError)]),
            DegradedCause::ResourceExhaustion
        );
        assert_eq!(
            DegradedCause::infer(&[attempt(FailureType::AuthenticationError)]),
            DegradedCause::AllProvidersFailed
        );
    }

    #[tokio::test]
    async fn static_responder_uses_cause_message() {
        let failed = vec!["openai".to_string()];
        let context = DegradedContext {
            prompt: "hi",
            cause: DegradedCause::NetworkIssues,
            failed_providers: &failed,
        };
        let text = StaticDegradedResponder.respond(&context).await;
        assert!(text.contains("could not be reached"));
    }

    #[test]
    fn skeleton_has_recovery_suggestions() {
        let response = degraded_response("x".to_string(), "all_providers_isolated", vec![]);
        assert_eq!(response.selection_path, SelectionPath::DegradedMode);
        for s in RECOVERY_SUGGESTIONS {
            assert!(response.suggestions.iter().any(|x| x == s));
        }
    }
}
