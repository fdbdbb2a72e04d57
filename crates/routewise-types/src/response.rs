//! Response envelopes produced by the router.

use serde::{Deserialize, Serialize};

use crate::provider::Usage;
use crate::selection::{SelectionPath, SelectionResult};

/// Recovery suggestions every degraded-mode response carries.
pub const RECOVERY_SUGGESTIONS: [&str; 3] = [
    "Retry later when providers recover",
    "Switch provider in settings",
    "Ask for a shorter or simpler response",
];

/// Upper bound on suggestions attached to a degraded response.
pub const MAX_SUGGESTIONS: usize = 5;

/// Canned response emitted when no provider can serve the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedResponse {
    pub content: String,
    pub selection_path: SelectionPath,
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    /// Why degraded mode was entered (e.g. `all_providers_isolated`).
    pub fallback_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Providers that were considered and could not serve the request.
    #[serde(default)]
    pub failed_providers: Vec<String>,
}

impl DegradedResponse {
    /// Make sure all fixed recovery suggestions are present, keeping any
    /// existing ones first and capping the list at [`MAX_SUGGESTIONS`].
    pub fn ensure_recovery_suggestions(&mut self) {
        for suggestion in RECOVERY_SUGGESTIONS {
            if !self.suggestions.iter().any(|s| s == suggestion) {
                self.suggestions.push(suggestion.to_string());
            }
        }
        if self.suggestions.len() > MAX_SUGGESTIONS {
            // Keep the fixed suggestions even when trimming extras.
            let mut kept: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);
            let extras = MAX_SUGGESTIONS - RECOVERY_SUGGESTIONS.len();
            kept.extend(
                self.suggestions
                    .iter()
                    .filter(|s| !RECOVERY_SUGGESTIONS.contains(&s.as_str()))
                    .take(extras)
                    .cloned(),
            );
            kept.extend(RECOVERY_SUGGESTIONS.iter().map(|s| s.to_string()));
            self.suggestions = kept;
        }
    }
}

/// Text produced by a provider, with the routing audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub text: String,
    pub provider: String,
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub latency_ms: f64,
    pub selection: SelectionResult,
    /// Providers tried and failed before `provider` answered.
    #[serde(default)]
    pub failed_attempts: Vec<String>,
}

/// Final outcome of routing a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteResponse {
    Generated(GeneratedResponse),
    Degraded(DegradedResponse),
}

impl RouteResponse {
    pub fn is_degraded(&self) -> bool {
        matches!(self, RouteResponse::Degraded(_))
    }
}
