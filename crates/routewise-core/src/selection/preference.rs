//! User preference normalization and validation.

use routewise_types::config::PreferenceValidation;
use routewise_types::error::RouterError;
use routewise_types::selection::UserPreference;

use crate::provider::registry::Registry;

/// Common spellings mapped to registry names.
const PROVIDER_ALIASES: [(&str, &str); 5] = [
    ("llama-cpp", "llamacpp"),
    ("llama_cpp", "llamacpp"),
    ("gpt", "openai"),
    ("google", "gemini"),
    ("hf", "huggingface"),
];

/// Lowercase, trim and resolve aliases.
pub fn normalize_provider_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    PROVIDER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}

/// Normalize `preference` and check it against the registry.
///
/// With `fallback_on_invalid`, an unknown provider is dropped (selection
/// falls through to the default hierarchy) and an unknown model is dropped
/// while the provider is kept. Otherwise both are errors.
pub fn validate_preference(
    preference: &UserPreference,
    registry: &dyn Registry,
    validation: &PreferenceValidation,
) -> Result<UserPreference, RouterError> {
    let Some(raw) = preference
        .provider
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    else {
        return Ok(UserPreference::default());
    };
    let provider = normalize_provider_name(raw);

    if validation.validate_provider_exists && registry.provider_spec(&provider).is_none() {
        if validation.fallback_on_invalid {
            tracing::warn!(provider = %raw, "Preferred provider is not registered, ignoring preference");
            return Ok(UserPreference::default());
        }
        return Err(RouterError::InvalidPreference(format!(
            "unknown provider '{raw}'"
        )));
    }

    let mut model = preference
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from);

    let requested = model.clone().filter(|_| validation.validate_model_exists);
    if let Some(wanted) = requested {
        // An empty or unavailable listing cannot disprove the model.
        let known = registry.list_models(&provider).unwrap_or_default();
        if !known.is_empty() && !known.iter().any(|m| m.id == wanted) {
            if !validation.fallback_on_invalid {
                return Err(RouterError::InvalidPreference(format!(
                    "unknown model '{wanted}' for provider '{provider}'"
                )));
            }
            tracing::warn!(
                provider = %provider,
                model = %wanted,
                "Preferred model is not offered, using provider default"
            );
            model = None;
        }
    }

    Ok(UserPreference {
        provider: Some(provider),
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewise_types::provider::ProviderSpec;

    use crate::provider::registry::ProviderRegistry;

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry.register(ProviderSpec::new("llamacpp"), vec![]);
        registry.register(
            ProviderSpec::new("openai"),
            vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()],
        );
        registry
    }

    fn strict() -> PreferenceValidation {
        PreferenceValidation {
            fallback_on_invalid: false,
            ..Default::default()
        }
    }

    #[test]
    fn aliases_normalize() {
        assert_eq!(normalize_provider_name("Llama-CPP"), "llamacpp");
        assert_eq!(normalize_provider_name("llama_cpp"), "llamacpp");
        assert_eq!(normalize_provider_name(" GPT "), "openai");
        assert_eq!(normalize_provider_name("google"), "gemini");
        assert_eq!(normalize_provider_name("hf"), "huggingface");
        assert_eq!(normalize_provider_name("DeepSeek"), "deepseek");
    }

    #[test]
    fn valid_preference_passes_normalized() {
        let pref = UserPreference::provider("GPT").with_model("gpt-4o");
        let validated = validate_preference(&pref, &registry(), &PreferenceValidation::default()).unwrap();
        assert_eq!(validated.provider.as_deref(), Some("openai"));
        assert_eq!(validated.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn unknown_provider_falls_through() {
        let pref = UserPreference::provider("anthropic");
        let validated = validate_preference(&pref, &registry(), &PreferenceValidation::default()).unwrap();
        assert!(validated.provider.is_none());
    }

    #[test]
    fn unknown_provider_errors_when_strict() {
        let pref = UserPreference::provider("anthropic");
        let err = validate_preference(&pref, &registry(), &strict()).unwrap_err();
        assert!(matches!(err, RouterError::InvalidPreference(_)));
    }

    #[test]
    fn unknown_model_dropped_provider_kept() {
        let pref = UserPreference::provider("openai").with_model("gpt-9");
        let validated = validate_preference(&pref, &registry(), &PreferenceValidation::default()).unwrap();
        assert_eq!(validated.provider.as_deref(), Some("openai"));
        assert!(validated.model.is_none());

        assert!(validate_preference(&pref, &registry(), &strict()).is_err());
    }

    #[test]
    fn empty_model_listing_accepts_any_model() {
        let pref = UserPreference::provider("llamacpp").with_model("anything-7b");
        let validated = validate_preference(&pref, &registry(), &strict()).unwrap();
        assert_eq!(validated.model.as_deref(), Some("anything-7b"));
    }

    #[test]
    fn validation_can_be_disabled() {
        let validation = PreferenceValidation {
            validate_provider_exists: false,
            validate_model_exists: false,
            fallback_on_invalid: false,
        };
        let pref = UserPreference::provider("custom").with_model("m");
        let validated = validate_preference(&pref, &registry(), &validation).unwrap();
        assert_eq!(validated.provider.as_deref(), Some("custom"));
    }

    #[test]
    fn missing_or_blank_provider_is_no_preference() {
        let validated =
            validate_preference(&UserPreference::default(), &registry(), &strict()).unwrap();
        assert!(validated.provider.is_none());

        let blank = UserPreference::provider("  ");
        assert!(validate_preference(&blank, &registry(), &strict()).unwrap().provider.is_none());
    }
}
