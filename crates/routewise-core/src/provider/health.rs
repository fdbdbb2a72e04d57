//! Periodic provider health checks.
//!
//! Runs every registered provider's `health_check()` concurrently, bounded by
//! the validation timeout, and writes the result into the registry. The
//! failure ledger reads these snapshots when deciding whether an isolated
//! provider has recovered.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use routewise_types::provider::HealthReport;

use super::registry::Registry;
use crate::config::SharedConfig;

/// Shortest period between health check rounds.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub struct HealthMonitor {
    registry: Arc<dyn Registry>,
    config: SharedConfig,
}

impl HealthMonitor {
    pub fn new(registry: Arc<dyn Registry>, config: SharedConfig) -> Self {
        Self { registry, config }
    }

    /// Check every provider that has an invocable handle and record the results.
    ///
    /// A check that exceeds the validation timeout is recorded as unhealthy.
    pub async fn check_all(&self) -> Vec<(String, HealthReport)> {
        let timeout = self.config.current().validation_timeout();

        let checks = self
            .registry
            .list_providers(false)
            .into_iter()
            .filter_map(|name| self.registry.provider(&name).map(|handle| (name, handle)))
            .map(|(name, handle)| async move {
                let report = match tokio::time::timeout(timeout, handle.health_check()).await {
                    Ok(report) => report,
                    Err(_) => HealthReport::unhealthy(format!(
                        "health check timed out after {}ms",
                        timeout.as_millis()
                    )),
                };
                (name, report)
            });

        let results = join_all(checks).await;

        for (name, report) in &results {
            if report.is_healthy() {
                tracing::debug!(provider = %name, "Health check passed");
            } else {
                tracing::warn!(
                    provider = %name,
                    status = %report.status,
                    error = report.error_message.as_deref().unwrap_or("-"),
                    "Health check reported a problem"
                );
            }
            self.registry.set_health(name, report.clone());
        }

        results
    }

    /// Run `check_all` every `interval` until `cancel` fires.
    ///
    /// Intervals shorter than [`MIN_CHECK_INTERVAL`] (including zero) are
    /// raised to it.
    pub fn spawn(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let interval = interval.max(MIN_CHECK_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Health monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.check_all().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    use routewise_types::config::RouterConfig;
    use routewise_types::error::ProviderError;
    use routewise_types::provider::{GenerateOptions, GenerationOutput, HealthStatus, ProviderSpec};

    use crate::provider::backend::Provider;
    use crate::provider::box_provider::BoxProvider;
    use crate::provider::registry::ProviderRegistry;

    struct Checked {
        name: String,
        status: HealthStatus,
        delay: Duration,
    }

    impl Provider for Checked {
        fn name(&self) -> &str {
            &self.name
        }

        fn generate(
            &self,
            _prompt: &str,
            _model: Option<&str>,
            _options: &GenerateOptions,
        ) -> impl Future<Output = Result<GenerationOutput, ProviderError>> + Send {
            async {
                Ok(GenerationOutput {
                    text: String::new(),
                    usage: None,
                })
            }
        }

        fn health_check(&self) -> impl Future<Output = HealthReport> + Send {
            let status = self.status;
            let delay = self.delay;
            async move {
                tokio::time::sleep(delay).await;
                HealthReport::now(status, None)
            }
        }
    }

    fn register(registry: &ProviderRegistry, name: &str, status: HealthStatus, delay: Duration) {
        registry.register_with_provider(
            ProviderSpec::new(name),
            vec![],
            BoxProvider::new(Checked {
                name: name.to_string(),
                status,
                delay,
            }),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn check_all_writes_reports_to_registry() {
        let registry = Arc::new(ProviderRegistry::new());
        register(&registry, "openai", HealthStatus::Healthy, Duration::ZERO);
        register(&registry, "gemini", HealthStatus::Degraded, Duration::ZERO);
        registry.register(ProviderSpec::new("spec-only"), vec![]);

        let monitor = HealthMonitor::new(registry.clone(), SharedConfig::default());
        let results = monitor.check_all().await;

        assert_eq!(results.len(), 2);
        assert!(registry.health_status("openai").unwrap().unwrap().is_healthy());
        assert_eq!(
            registry.health_status("gemini").unwrap().unwrap().status,
            HealthStatus::Degraded
        );
        assert!(registry.health_status("spec-only").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_check_is_recorded_unhealthy() {
        let registry = Arc::new(ProviderRegistry::new());
        register(&registry, "slow", HealthStatus::Healthy, Duration::from_secs(60));

        let config = SharedConfig::new(RouterConfig {
            validation_timeout_secs: 1,
            ..Default::default()
        });
        let monitor = HealthMonitor::new(registry.clone(), config);
        monitor.check_all().await;

        let report = registry.health_status("slow").unwrap().unwrap();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_stops_on_cancel() {
        let registry = Arc::new(ProviderRegistry::new());
        register(&registry, "openai", HealthStatus::Healthy, Duration::ZERO);

        let monitor = Arc::new(HealthMonitor::new(registry.clone(), SharedConfig::default()));
        let cancel = CancellationToken::new();
        let handle = monitor.spawn(Duration::from_secs(30), cancel.clone());

        // First tick fires immediately.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.health_status("openai").unwrap().is_some());

        cancel.cancel();
        handle.await.unwrap();
    }
    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let registry = Arc::new(ProviderRegistry::new());
        register(&registry, "openai", HealthStatus::Healthy, Duration::ZERO);

        let monitor = Arc::new(HealthMonitor::new(registry.clone(), SharedConfig::default()));
        let cancel = CancellationToken::new();
        let handle = monitor.spawn(Duration::ZERO, cancel.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = registry.health_status("openai").unwrap().unwrap().last_check;
        assert!(first.is_some());

        cancel.cancel();
        handle.await.unwrap();
    }
}
