//! Shared, hot-swappable router configuration.

use std::sync::{Arc, RwLock};

use routewise_types::config::RouterConfig;

/// Handle to the current [`RouterConfig`], shared by every component.
///
/// Readers take a cheap `Arc` snapshot; `replace` swaps the whole config
/// atomically so a decision never sees a half-applied reload.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<RouterConfig>>>,
}

impl SharedConfig {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> Arc<RouterConfig> {
        self.inner
            .read()
            .expect("router config lock poisoned")
            .clone()
    }

    /// Install a new configuration.
    pub fn replace(&self, config: RouterConfig) {
        *self.inner.write().expect("router config lock poisoned") = Arc::new(config);
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}
