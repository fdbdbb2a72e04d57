use thiserror::Error;

use crate::failure::FailureType;

/// Error returned by a provider's `generate` call.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: FailureType,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: FailureType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after_ms: u128) -> Self {
        Self::new(
            FailureType::TimeoutError,
            format!("no response within {after_ms}ms"),
        )
    }
}

/// Errors from the provider registry source.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("provider not registered: {0}")]
    UnknownProvider(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the router to the orchestration layer.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("all providers failed in chain ({}): {last_error}", .attempted.join(", "))]
    GenerationFailed {
        attempted: Vec<String>,
        last_error: String,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid preference: {0}")]
    InvalidPreference(String),
}

/// Errors from loading an explicit configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new(FailureType::RateLimitError, "429 Too Many Requests");
        assert_eq!(err.to_string(), "rate_limit_error: 429 Too Many Requests");
    }

    #[test]
    fn test_timeout_error_kind() {
        let err = ProviderError::timeout(10_000);
        assert_eq!(err.kind, FailureType::TimeoutError);
        assert!(err.message.contains("10000ms"));
    }

    #[test]
    fn test_generation_failed_display() {
        let err = RouterError::GenerationFailed {
            attempted: vec!["openai".to_string(), "gemini".to_string()],
            last_error: "timeout".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("openai, gemini"));
        assert!(msg.contains("timeout"));
    }
}
