//! Provider trait definition.
//!
//! Providers are opaque, capability-bearing endpoints. The network call to a
//! vendor API or local runtime lives in the implementation, outside this crate.

use std::future::Future;

use routewise_types::error::ProviderError;
use routewise_types::provider::{GenerateOptions, GenerationOutput, HealthReport};

/// A backend able to serve generation requests.
///
/// Uses native async fn in traits (RPITIT). Wrap in
/// [`BoxProvider`](super::box_provider::BoxProvider) for dynamic dispatch.
pub trait Provider: Send + Sync {
    /// Registry name of this provider (e.g. "openai", "llamacpp").
    fn name(&self) -> &str;

    /// Generate text for `prompt`. `model == None` means the provider default.
    fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        options: &GenerateOptions,
    ) -> impl Future<Output = Result<GenerationOutput, ProviderError>> + Send;

    /// Check the backend. Never errors; failures are reported as unhealthy.
    fn health_check(&self) -> impl Future<Output = HealthReport> + Send;
}
