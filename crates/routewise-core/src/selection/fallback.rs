//! Model fallback chains.
//!
//! Each `(provider, primary model)` pair gets a lazily built list of
//! substitute models from the same provider, smallest first. Failures and
//! successes reported by the invocation loop update every cached chain of
//! that provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::SharedConfig;
use crate::provider::registry::Registry;

/// Substitute models for one primary model.
///
/// `fallback_models` never contains `primary_model`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelFallbackChain {
    pub primary_model: String,
    pub fallback_models: Vec<String>,
    pub failure_counts: BTreeMap<String, u32>,
    pub last_successful_model: Option<String>,
}

impl ModelFallbackChain {
    fn contains(&self, model: &str) -> bool {
        self.primary_model == model || self.fallback_models.iter().any(|m| m == model)
    }

    fn failures(&self, model: &str) -> u32 {
        self.failure_counts.get(model).copied().unwrap_or(0)
    }
}

/// Size bucket from the model id: 7b/small, 13b/medium, 70b/large, unknown.
pub fn size_rank(model: &str) -> u8 {
    let id = model.to_ascii_lowercase();
    if id.contains("7b") || id.contains("small") {
        1
    } else if id.contains("13b") || id.contains("medium") {
        2
    } else if id.contains("70b") || id.contains("large") {
        3
    } else {
        4
    }
}

type ChainKey = (String, String);

pub struct ModelFallbackResolver {
    registry: Arc<dyn Registry>,
    config: SharedConfig,
    chains: DashMap<ChainKey, ModelFallbackChain>,
}

impl ModelFallbackResolver {
    pub fn new(registry: Arc<dyn Registry>, config: SharedConfig) -> Self {
        Self {
            registry,
            config,
            chains: DashMap::new(),
        }
    }

    /// Ordered models to try for `provider`: the primary first, then every
    /// fallback whose failure count is still under the threshold.
    pub fn fallback_chain(&self, provider: &str, primary_model: &str) -> Vec<String> {
        let threshold = self.config.current().max_failure_threshold;
        let chain = self.ensure_chain(provider, primary_model);

        std::iter::once(chain.primary_model.clone())
            .chain(
                chain
                    .fallback_models
                    .iter()
                    .filter(|m| chain.failures(m) < threshold)
                    .cloned(),
            )
            .collect()
    }

    /// Model to actually request: the primary unless it has failed too
    /// often, then the last model that worked, then the first viable fallback.
    pub fn viable_model(&self, provider: &str, primary_model: &str) -> String {
        let threshold = self.config.current().max_failure_threshold;
        let chain = self.ensure_chain(provider, primary_model);

        if chain.failures(primary_model) < threshold {
            return primary_model.to_string();
        }
        if let Some(last) = chain
            .last_successful_model
            .as_ref()
            .filter(|m| chain.failures(m) < threshold)
        {
            return last.clone();
        }
        chain
            .fallback_models
            .iter()
            .find(|m| chain.failures(m) < threshold)
            .cloned()
            .unwrap_or_else(|| primary_model.to_string())
    }

    /// Count a failure of `model` in every chain of `provider` containing it.
    pub fn record_model_failure(&self, provider: &str, model: &str) {
        drop(self.ensure_chain(provider, model));

        for mut entry in self.chains.iter_mut() {
            if entry.key().0 != provider || !entry.contains(model) {
                continue;
            }
            let chain = entry.value_mut();
            *chain.failure_counts.entry(model.to_string()).or_default() += 1;
            if chain.last_successful_model.as_deref() == Some(model) {
                chain.last_successful_model = None;
            }
        }
    }

    /// Remember `model` as the last one that answered, in every chain of
    /// `provider` containing it.
    pub fn record_model_success(&self, provider: &str, model: &str) {
        for mut entry in self.chains.iter_mut() {
            if entry.key().0 == provider && entry.contains(model) {
                entry.value_mut().last_successful_model = Some(model.to_string());
            }
        }
    }

    /// Snapshot of a cached chain, if it has been built.
    pub fn chain(&self, provider: &str, primary_model: &str) -> Option<ModelFallbackChain> {
        self.chains
            .get(&(provider.to_string(), primary_model.to_string()))
            .map(|c| c.value().clone())
    }

    /// Drop every cached chain; used on config reload.
    pub fn clear(&self) {
        self.chains.clear();
    }

    fn ensure_chain(
        &self,
        provider: &str,
        primary_model: &str,
    ) -> dashmap::mapref::one::RefMut<'_, ChainKey, ModelFallbackChain> {
        self.chains
            .entry((provider.to_string(), primary_model.to_string()))
            .or_insert_with(|| self.build_chain(provider, primary_model))
    }

    fn build_chain(&self, provider: &str, primary_model: &str) -> ModelFallbackChain {
        let mut fallback_models: Vec<String> = match self.registry.list_models(provider) {
            Ok(models) => models.into_iter().map(|m| m.id).collect(),
            Err(err) => {
                tracing::debug!(
                    provider = %provider,
                    error = %err,
                    "Model listing unavailable, fallback chain has primary only"
                );
                Vec::new()
            }
        };
        fallback_models.retain(|m| m != primary_model);
        let mut seen = std::collections::HashSet::new();
        fallback_models.retain(|m| seen.insert(m.clone()));
        fallback_models.sort_by_key(|m| size_rank(m));

        tracing::debug!(
            provider = %provider,
            primary = %primary_model,
            fallbacks = fallback_models.len(),
            "Built model fallback chain"
        );

        ModelFallbackChain {
            primary_model: primary_model.to_string(),
            fallback_models,
            failure_counts: BTreeMap::new(),
            last_successful_model: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewise_types::config::RouterConfig;
    use routewise_types::provider::ProviderSpec;

    use crate::provider::registry::ProviderRegistry;

    fn resolver(models: &[&str]) -> ModelFallbackResolver {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(
            ProviderSpec::new("llamacpp"),
            models.iter().map(|m| m.to_string()).collect(),
        );
        let config = SharedConfig::new(RouterConfig {
            max_failure_threshold: 2,
            ..Default::default()
        });
        ModelFallbackResolver::new(registry, config)
    }

    #[test]
    fn size_rank_buckets() {
        assert_eq!(size_rank("llama-2-7b-chat"), 1);
        assert_eq!(size_rank("phi-small"), 1);
        assert_eq!(size_rank("llama-2-13B"), 2);
        assert_eq!(size_rank("llama-2-70b"), 3);
        assert_eq!(size_rank("mistral-large"), 3);
        assert_eq!(size_rank("tinyllama"), 4);
    }

    #[test]
    fn chain_starts_with_primary_and_orders_by_size() {
        let resolver = resolver(&["llama-70b", "mystery", "llama-13b", "llama-7b", "primary"]);
        let chain = resolver.fallback_chain("llamacpp", "primary");
        assert_eq!(chain, vec!["primary", "llama-7b", "llama-13b", "llama-70b", "mystery"]);

        let cached = resolver.chain("llamacpp", "primary").unwrap();
        assert!(!cached.fallback_models.contains(&"primary".to_string()));
    }

    #[test]
    fn over_failed_models_are_omitted_in_order() {
        let resolver = resolver(&["a-7b", "b-13b", "c-70b"]);
        resolver.fallback_chain("llamacpp", "a-7b");
        resolver.record_model_failure("llamacpp", "b-13b");
        resolver.record_model_failure("llamacpp", "b-13b");

        assert_eq!(resolver.fallback_chain("llamacpp", "a-7b"), vec!["a-7b", "c-70b"]);
    }

    #[test]
    fn unavailable_listing_yields_primary_only() {
        let resolver = resolver(&[]);
        assert_eq!(resolver.fallback_chain("ghost", "m"), vec!["m"]);
    }

    #[test]
    fn query_is_idempotent() {
        let resolver = resolver(&["x-7b", "y-13b"]);
        let first = resolver.fallback_chain("llamacpp", "x-7b");
        let second = resolver.fallback_chain("llamacpp", "x-7b");
        assert_eq!(first, second);
    }

    #[test]
    fn failure_updates_every_chain_containing_model() {
        let resolver = resolver(&["a-7b", "b-13b", "c-70b"]);
        resolver.fallback_chain("llamacpp", "a-7b");
        resolver.fallback_chain("llamacpp", "c-70b");

        resolver.record_model_failure("llamacpp", "b-13b");

        assert_eq!(resolver.chain("llamacpp", "a-7b").unwrap().failure_counts["b-13b"], 1);
        assert_eq!(resolver.chain("llamacpp", "c-70b").unwrap().failure_counts["b-13b"], 1);
        assert_eq!(resolver.chain("llamacpp", "b-13b").unwrap().failure_counts["b-13b"], 1);
    }

    #[test]
    fn success_is_remembered_and_cleared_by_failure() {
        let resolver = resolver(&["a-7b", "b-13b"]);
        resolver.fallback_chain("llamacpp", "a-7b");

        resolver.record_model_success("llamacpp", "b-13b");
        assert_eq!(
            resolver.chain("llamacpp", "a-7b").unwrap().last_successful_model.as_deref(),
            Some("b-13b")
        );

        resolver.record_model_failure("llamacpp", "b-13b");
        assert!(resolver.chain("llamacpp", "a-7b").unwrap().last_successful_model.is_none());
    }

    #[test]
    fn viable_model_skips_over_failed_primary() {
        let resolver = resolver(&["a-7b", "b-13b", "c-70b"]);
        assert_eq!(resolver.viable_model("llamacpp", "c-70b"), "c-70b");

        resolver.record_model_failure("llamacpp", "c-70b");
        resolver.record_model_failure("llamacpp", "c-70b");
        assert_eq!(resolver.viable_model("llamacpp", "c-70b"), "a-7b");

        resolver.record_model_success("llamacpp", "b-13b");
        assert_eq!(resolver.viable_model("llamacpp", "c-70b"), "b-13b");
    }

    #[test]
    fn clear_drops_cached_chains() {
        let resolver = resolver(&["a-7b"]);
        resolver.fallback_chain("llamacpp", "a-7b");
        resolver.clear();
        assert!(resolver.chain("llamacpp", "a-7b").is_none());
    }
}
