//! Provider capability registry.
//!
//! The registry is the source of truth for which providers exist, what they
//! can do, which models they offer, and their last health snapshot. The
//! routing core only reads specs and reads/writes health.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use routewise_types::error::RegistryError;
use routewise_types::provider::{HealthReport, HealthStatus, ModelInfo, ProviderSpec};

use super::box_provider::BoxProvider;

/// Read/write view of provider registrations consumed by the routing core.
///
/// `list_providers` returns names in registration order so that scoring
/// ties resolve deterministically.
pub trait Registry: Send + Sync {
    /// Registered provider names. With `healthy_only`, providers whose last
    /// health report is `unhealthy` are left out.
    fn list_providers(&self, healthy_only: bool) -> Vec<String>;

    fn provider_spec(&self, name: &str) -> Option<ProviderSpec>;

    /// Last health snapshot, `Ok(None)` if no check has been recorded.
    fn health_status(&self, name: &str) -> Result<Option<HealthReport>, RegistryError>;

    fn list_models(&self, name: &str) -> Result<Vec<ModelInfo>, RegistryError>;

    fn set_health(&self, name: &str, report: HealthReport);

    /// Invocable handle for a provider, if one was registered.
    fn provider(&self, name: &str) -> Option<Arc<BoxProvider>>;
}

struct RegistryEntry {
    spec: ProviderSpec,
    models: Vec<String>,
    health: Option<HealthReport>,
    handle: Option<Arc<BoxProvider>>,
}

/// In-memory registry keyed by provider name.
pub struct ProviderRegistry {
    order: RwLock<Vec<String>>,
    entries: DashMap<String, RegistryEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            order: RwLock::new(Vec::new()),
            entries: DashMap::new(),
        }
    }

    /// Register a provider spec without an invocable handle.
    ///
    /// Re-registering a name replaces its spec but keeps its position.
    pub fn register(&self, spec: ProviderSpec, models: Vec<String>) {
        self.insert(spec, models, None);
    }

    /// Register a provider spec together with its invocable backend.
    pub fn register_with_provider(&self, spec: ProviderSpec, models: Vec<String>, provider: BoxProvider) {
        self.insert(spec, models, Some(Arc::new(provider)));
    }

    fn insert(&self, spec: ProviderSpec, models: Vec<String>, handle: Option<Arc<BoxProvider>>) {
        let name = spec.name.clone();
        let previous_health = self.entries.get(&name).and_then(|e| e.health.clone());
        self.entries.insert(
            name.clone(),
            RegistryEntry {
                spec,
                models,
                health: previous_health,
                handle,
            },
        );

        let mut order = self.order.write().expect("registry order lock poisoned");
        if !order.contains(&name) {
            order.push(name);
        }
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order
            .read()
            .expect("registry order lock poisoned")
            .clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for ProviderRegistry {
    fn list_providers(&self, healthy_only: bool) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|name| {
                if !healthy_only {
                    return true;
                }
                self.entries
                    .get(name)
                    .map(|e| {
                        e.health
                            .as_ref()
                            .is_none_or(|h| h.status != HealthStatus::Unhealthy)
                    })
                    .unwrap_or(false)
            })
            .collect()
    }

    fn provider_spec(&self, name: &str) -> Option<ProviderSpec> {
        self.entries.get(name).map(|e| e.spec.clone())
    }

    fn health_status(&self, name: &str) -> Result<Option<HealthReport>, RegistryError> {
        self.entries
            .get(name)
            .map(|e| e.health.clone())
            .ok_or_else(|| RegistryError::UnknownProvider(name.to_string()))
    }

    fn list_models(&self, name: &str) -> Result<Vec<ModelInfo>, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownProvider(name.to_string()))?;
        Ok(entry
            .models
            .iter()
            .map(|id| ModelInfo {
                id: id.clone(),
                provider: name.to_string(),
            })
            .collect())
    }

    fn set_health(&self, name: &str, report: HealthReport) {
        match self.entries.get_mut(name) {
            Some(mut entry) => entry.health = Some(report),
            None => tracing::debug!(provider = %name, "Health report for unregistered provider ignored"),
        }
    }

    fn provider(&self, name: &str) -> Option<Arc<BoxProvider>> {
        self.entries.get(name).and_then(|e| e.handle.clone())
    }
}
