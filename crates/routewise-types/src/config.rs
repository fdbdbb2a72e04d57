//! Router configuration.
//!
//! `RouterConfig` is the top-level `routewise.toml`. Every field has a
//! default, so an empty file is a valid configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityType;
use crate::error::ConfigError;
use crate::provider::{HealthStatus, ProviderSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Failures (within the failure window) before a provider is isolated.
    #[serde(default = "default_max_failure_threshold")]
    pub max_failure_threshold: u32,

    /// How long an isolated provider stays out of selection before a recovery check.
    #[serde(default = "default_isolation_duration_secs")]
    pub isolation_duration_secs: u64,

    /// Delay between recovery checks while a provider stays unhealthy.
    #[serde(default = "default_recovery_check_interval_secs")]
    pub recovery_check_interval_secs: u64,

    /// Window in which `max_failure_threshold` failures trip isolation.
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,

    /// Number of failure events retained for statistics.
    #[serde(default = "default_failure_history_capacity")]
    pub failure_history_capacity: usize,

    /// Upper bound on a single provider call or health check.
    #[serde(default = "default_validation_timeout_secs")]
    pub validation_timeout_secs: u64,

    /// Ordered provider list walked by the system default step.
    #[serde(default = "default_hierarchy")]
    pub default_hierarchy: Vec<String>,

    #[serde(default)]
    pub hard_final_fallback: HardFallback,

    #[serde(default)]
    pub preference_validation: PreferenceValidation,

    /// Statically declared providers used to seed the registry.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

fn default_max_failure_threshold() -> u32 {
    5
}

fn default_isolation_duration_secs() -> u64 {
    300
}

fn default_recovery_check_interval_secs() -> u64 {
    60
}

fn default_failure_window_secs() -> u64 {
    300
}

fn default_failure_history_capacity() -> usize {
    1000
}

fn default_validation_timeout_secs() -> u64 {
    10
}

fn default_hierarchy() -> Vec<String> {
    ["llamacpp", "transformers", "openai", "gemini", "deepseek", "huggingface"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_failure_threshold: default_max_failure_threshold(),
            isolation_duration_secs: default_isolation_duration_secs(),
            recovery_check_interval_secs: default_recovery_check_interval_secs(),
            failure_window_secs: default_failure_window_secs(),
            failure_history_capacity: default_failure_history_capacity(),
            validation_timeout_secs: default_validation_timeout_secs(),
            default_hierarchy: default_hierarchy(),
            hard_final_fallback: HardFallback::default(),
            preference_validation: PreferenceValidation::default(),
            providers: Vec::new(),
        }
    }
}

impl RouterConfig {
    pub fn isolation_duration(&self) -> Duration {
        Duration::from_secs(self.isolation_duration_secs)
    }

    pub fn recovery_check_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_check_interval_secs)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    /// Reject values the router cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "max_failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.failure_history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "failure_history_capacity must be at least 1".to_string(),
            ));
        }
        if self.hard_final_fallback.provider.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "hard_final_fallback.provider must not be empty".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.providers {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' declared more than once",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

/// Last-resort provider/model pair tried after the default hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardFallback {
    pub provider: String,
    pub model: String,
}

impl Default for HardFallback {
    fn default() -> Self {
        Self {
            provider: "llamacpp".to_string(),
            model: "tinyllama-1.1b-chat".to_string(),
        }
    }
}

/// How user provider/model preferences are validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceValidation {
    #[serde(default = "default_true")]
    pub validate_provider_exists: bool,
    #[serde(default = "default_true")]
    pub validate_model_exists: bool,
    /// Drop an invalid preference and continue instead of rejecting the request.
    #[serde(default = "default_true")]
    pub fallback_on_invalid: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PreferenceValidation {
    fn default() -> Self {
        Self {
            validate_provider_exists: true,
            validate_model_exists: true,
            fallback_on_invalid: true,
        }
    }
}

/// A provider declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    #[serde(default)]
    pub capabilities: BTreeSet<CapabilityType>,
    #[serde(default)]
    pub requires_api_key: bool,
    #[serde(default = "default_true")]
    pub is_llm_provider: bool,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Model ids offered by this provider, used to build fallback chains.
    #[serde(default)]
    pub models: Vec<String>,
    /// Health assumed until the first health check runs.
    #[serde(default)]
    pub health: HealthStatus,
}

impl ProviderEntry {
    pub fn to_spec(&self) -> ProviderSpec {
        ProviderSpec {
            name: self.name.clone(),
            capabilities: self.capabilities.clone(),
            requires_api_key: self.requires_api_key,
            is_llm_provider: self.is_llm_provider,
            default_model: self.default_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_config_default_values() {
        let config = RouterConfig::default();
        assert_eq!(config.max_failure_threshold, 5);
        assert_eq!(config.isolation_duration(), Duration::from_secs(300));
        assert_eq!(config.recovery_check_interval(), Duration::from_secs(60));
        assert_eq!(config.validation_timeout(), Duration::from_secs(10));
        assert_eq!(config.failure_history_capacity, 1000);
        assert_eq!(
            config.default_hierarchy,
            vec!["llamacpp", "transformers", "openai", "gemini", "deepseek", "huggingface"]
        );
        assert_eq!(config.hard_final_fallback.provider, "llamacpp");
        assert_eq!(config.hard_final_fallback.model, "tinyllama-1.1b-chat");
        assert!(config.preference_validation.fallback_on_invalid);
    }

    #[test]
    fn test_router_config_deserialize_empty() {
        let config: RouterConfig = toml::from_str("").unwrap();
        assert_eq!(config, RouterConfig::default());
    }

    #[test]
    fn test_router_config_deserialize_with_values() {
        let toml_str = r#"
max_failure_threshold = 3
isolation_duration_secs = 120
default_hierarchy = ["openai", "gemini"]

[hard_final_fallback]
provider = "llamacpp"
model = "phi-2-small"

[preference_validation]
fallback_on_invalid = false

[[providers]]
name = "openai"
capabilities = ["streaming", "function_calling", "vision"]
requires_api_key = true
default_model = "gpt-4o-mini"
models = ["gpt-4o-mini", "gpt-4o"]
health = "healthy"

[[providers]]
name = "llamacpp"
capabilities = ["streaming"]
"#;
        let config: RouterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_failure_threshold, 3);
        assert_eq!(config.isolation_duration_secs, 120);
        assert_eq!(config.recovery_check_interval_secs, 60);
        assert_eq!(config.default_hierarchy, vec!["openai", "gemini"]);
        assert_eq!(config.hard_final_fallback.model, "phi-2-small");
        assert!(!config.preference_validation.fallback_on_invalid);
        assert!(config.preference_validation.validate_provider_exists);
        assert_eq!(config.providers.len(), 2);

        let openai = &config.providers[0];
        assert!(openai.capabilities.contains(&CapabilityType::Vision));
        assert_eq!(openai.health, HealthStatus::Healthy);
        assert_eq!(config.providers[1].health, HealthStatus::Unknown);

        let spec = openai.to_spec();
        assert!(spec.requires_api_key);
        assert_eq!(spec.default_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let config = RouterConfig {
            max_failure_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(RouterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_providers() {
        let entry: ProviderEntry = toml::from_str(r#"name = "openai""#).unwrap();
        let config = RouterConfig {
            providers: vec![entry.clone(), entry],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
