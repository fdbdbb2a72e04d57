//! Registry bootstrap from configuration.

use routewise_core::provider::registry::{ProviderRegistry, Registry};
use routewise_types::capability::CapabilityType;
use routewise_types::config::RouterConfig;
use routewise_types::provider::{HealthReport, HealthStatus, ProviderSpec};

/// Build a registry from the `[[providers]]` table.
///
/// Without a provider table, every provider named by the default hierarchy
/// and the hard fallback is registered as a streaming-only provider so the
/// selection procedure has something to walk.
pub fn build_registry(config: &RouterConfig) -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    if config.providers.is_empty() {
        let hard = &config.hard_final_fallback;
        let names = config
            .default_hierarchy
            .iter()
            .chain(std::iter::once(&hard.provider));
        for name in names {
            if registry.contains(name) {
                continue;
            }
            let mut spec = ProviderSpec::new(name.as_str()).with_capabilities([CapabilityType::Streaming]);
            let mut models = Vec::new();
            if *name == hard.provider {
                spec = spec.with_default_model(hard.model.as_str());
                models.push(hard.model.clone());
            }
            registry.register(spec, models);
        }
        tracing::debug!(
            providers = registry.len(),
            "No provider table configured, seeded registry from hierarchy"
        );
        return registry;
    }

    for entry in &config.providers {
        registry.register(entry.to_spec(), entry.models.clone());
        if entry.health != HealthStatus::Unknown {
            registry.set_health(&entry.name, HealthReport::now(entry.health, None));
        }
    }
    tracing::debug!(providers = registry.len(), "Registry built from provider table");
    registry
}
