//! BoxProvider -- object-safe dynamic dispatch wrapper for Provider.
//!
//! 1. `ProviderDyn` is the object-safe mirror of `Provider` with boxed futures
//! 2. Blanket-impl `ProviderDyn` for all `T: Provider`
//! 3. `BoxProvider` wraps `Box<dyn ProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use routewise_types::error::ProviderError;
use routewise_types::provider::{GenerateOptions, GenerationOutput, HealthReport};

use super::backend::Provider;

/// Object-safe version of [`Provider`] with boxed futures.
pub trait ProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        model: Option<&'a str>,
        options: &'a GenerateOptions,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutput, ProviderError>> + Send + 'a>>;

    fn health_check_boxed<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthReport> + Send + 'a>>;
}

impl<T: Provider> ProviderDyn for T {
    fn name(&self) -> &str {
        Provider::name(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        model: Option<&'a str>,
        options: &'a GenerateOptions,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutput, ProviderError>> + Send + 'a>> {
        Box::pin(self.generate(prompt, model, options))
    }

    fn health_check_boxed<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthReport> + Send + 'a>> {
        Box::pin(self.health_check())
    }
}

/// Type-erased provider for runtime selection by name.
pub struct BoxProvider {
    inner: Box<dyn ProviderDyn + Send + Sync>,
}

impl BoxProvider {
    pub fn new<T: Provider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<GenerationOutput, ProviderError> {
        self.inner.generate_boxed(prompt, model, options).await
    }

    pub async fn health_check(&self) -> HealthReport {
        self.inner.health_check_boxed().await
    }
}

impl std::fmt::Debug for BoxProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxProvider")
            .field("name", &self.name())
            .finish()
    }
}
