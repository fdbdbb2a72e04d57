//! Cached provider capability sets shared by the planner and the scorer.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use routewise_types::capability::CapabilityType;

use crate::provider::registry::Registry;

pub struct CapabilityCache {
    registry: Arc<dyn Registry>,
    sets: DashMap<String, BTreeSet<CapabilityType>>,
}

impl CapabilityCache {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            sets: DashMap::new(),
        }
    }

    /// Declared capabilities of `provider`, read from the registry once.
    ///
    /// A provider without a spec is assumed to stream and nothing else.
    pub fn get(&self, provider: &str) -> BTreeSet<CapabilityType> {
        self.sets
            .entry(provider.to_string())
            .or_insert_with(|| {
                tracing::debug!(provider = %provider, "Caching provider capabilities");
                self.registry
                    .provider_spec(provider)
                    .map(|s| s.capabilities)
                    .unwrap_or_else(|| BTreeSet::from([CapabilityType::Streaming]))
            })
            .clone()
    }

    /// Forget every cached set; the next lookup re-reads the registry.
    pub fn clear(&self) {
        self.sets.clear();
    }
}
