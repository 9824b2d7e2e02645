//! Connection Health Monitor (§4.I)
//!
//! The periodic-probe loop runs as `tokio::select!` over an `interval` tick
//! and a `CancellationToken`. Environment adaptation (doubled
//! timeouts/thresholds on constrained deployments) detects VPS/container
//! deployments and adjusts accordingly.

mod environment;

pub use environment::DeploymentEnvironment;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::ErrorCategory;
use crate::instance_health::HealthStatus;
use crate::platform::Platform;
use crate::prioritizer::Prioritizer;

/// Capped exponential backoff for the recovery task §4.I schedules once a
/// service crosses `max_consecutive_failures`: doubling delay between probe
/// attempts, capped at 10 minutes, giving up after a fixed attempt budget
/// (a fresh probe failure is free to reschedule afterwards).
const RECOVERY_BASE_DELAY: Duration = Duration::from_secs(30);
const RECOVERY_MAX_DELAY: Duration = Duration::from_secs(600);
const RECOVERY_MAX_ATTEMPTS: u32 = 6;

#[derive(Debug, Clone)]
pub struct ServiceHealth {
    pub consecutive_failures: u32,
    pub status: HealthStatus,
}

impl Default for ServiceHealth {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            status: HealthStatus::Healthy,
        }
    }
}

pub struct HealthMonitorConfig {
    pub check_interval: Duration,
    pub max_consecutive_failures: u32,
    pub timeout_multiplier: f64,
    pub probe_timeout: Duration,
}

impl HealthMonitorConfig {
    /// Build config for `env`, applying the doubled-timeout / raised-threshold
    /// rule for constrained deployments (§4.I "Environment adaptation").
    pub fn for_environment(env: DeploymentEnvironment) -> Self {
        if env.is_constrained() {
            Self {
                check_interval: Duration::from_secs(60),
                max_consecutive_failures: 5,
                timeout_multiplier: 2.0,
                probe_timeout: Duration::from_secs(60),
            }
        } else {
            Self {
                check_interval: Duration::from_secs(30),
                max_consecutive_failures: 3,
                timeout_multiplier: 1.0,
                probe_timeout: Duration::from_secs(30),
            }
        }
    }
}

pub struct HealthMonitor {
    config: HealthMonitorConfig,
    health: RwLock<HashMap<String, ServiceHealth>>,
    prioritizer: Arc<Prioritizer>,
    recovering: RwLock<HashSet<String>>,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig, prioritizer: Arc<Prioritizer>) -> Self {
        Self {
            config,
            health: RwLock::new(HashMap::new()),
            prioritizer,
            recovering: RwLock::new(HashSet::new()),
        }
    }

    /// Probe one platform with a lightweight `search("test", 1)` call,
    /// classify the outcome, feed the Prioritizer (§4.H), and schedule a
    /// recovery task the moment the service crosses into Unhealthy.
    pub async fn probe_platform(self: Arc<Self>, platform: Arc<dyn Platform>) {
        let name = platform.name().to_string();
        let timeout = self.config.probe_timeout;

        let outcome = tokio::time::timeout(timeout, platform.search("test", 1)).await;

        let (success, category) = match outcome {
            Ok(Ok(_)) => (true, None),
            Ok(Err(err)) => (false, Some(err.category())),
            Err(_elapsed) => (false, Some(ErrorCategory::Timeout)),
        };

        let status = self.record_outcome(&name, success, category).await;
        self.maybe_schedule_recovery(platform, status).await;
    }

    async fn record_outcome(&self, service: &str, success: bool, category: Option<ErrorCategory>) -> HealthStatus {
        let mut guard = self.health.write().await;
        let entry = guard.entry(service.to_string()).or_default();

        if success {
            entry.consecutive_failures = 0;
            entry.status = HealthStatus::Healthy;
        } else {
            entry.consecutive_failures += 1;

            // Recent Network-category errors extend the failure threshold by 2
            // for 5 minutes (§4.I). We approximate "for 5 minutes" here by
            // applying the extension whenever the triggering error is itself
            // Network-category, matching the common case the original guards.
            let threshold = if category == Some(ErrorCategory::Network) {
                self.config.max_consecutive_failures + 2
            } else {
                self.config.max_consecutive_failures
            };

            entry.status = if entry.consecutive_failures >= threshold {
                warn!(service, failures = entry.consecutive_failures, "service marked unhealthy");
                HealthStatus::Unhealthy
            } else {
                HealthStatus::Degraded
            };
        }

        let status = entry.status;
        drop(guard);
        self.prioritizer.update_health(service, status).await;
        status
    }

    /// Ensure at most one recovery task runs per service at a time; a probe
    /// failure that lands while a recovery task is already in flight is a
    /// no-op here, since that task will observe the failure itself.
    async fn maybe_schedule_recovery(self: Arc<Self>, platform: Arc<dyn Platform>, status: HealthStatus) {
        if status != HealthStatus::Unhealthy {
            return;
        }
        let name = platform.name().to_string();
        {
            let mut guard = self.recovering.write().await;
            if !guard.insert(name.clone()) {
                return;
            }
        }
        self.schedule_recovery(name, platform);
    }

    fn schedule_recovery(self: Arc<Self>, name: String, platform: Arc<dyn Platform>) {
        tokio::spawn(async move {
            info!(service = %name, "scheduling recovery task for unhealthy service");
            let mut delay = RECOVERY_BASE_DELAY;
            for attempt in 1..=RECOVERY_MAX_ATTEMPTS {
                tokio::time::sleep(delay).await;
                debug!(service = %name, attempt, "recovery probe");
                self.clone().probe_platform(platform.clone()).await;
                if matches!(self.status(&name).await, Some(h) if h.status == HealthStatus::Healthy) {
                    info!(service = %name, attempt, "service recovered");
                    break;
                }
                delay = (delay * 2).min(RECOVERY_MAX_DELAY);
            }
            self.recovering.write().await.remove(&name);
        });
    }

    pub async fn status(&self, service: &str) -> Option<ServiceHealth> {
        self.health.read().await.get(service).cloned()
    }

    pub async fn report(&self) -> HashMap<String, ServiceHealth> {
        self.health.read().await.clone()
    }

    /// Periodic probe loop: every `check_interval`, probe every registered
    /// platform; stops cleanly on cancellation.
    pub async fn run(self: Arc<Self>, platforms: &[Arc<dyn Platform>], cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.check_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for platform in platforms {
                        self.clone().probe_platform(platform.clone()).await;
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("health monitor stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prioritizer::PrioritizationStrategy;

    #[tokio::test]
    async fn three_failures_mark_unhealthy_on_unconstrained() {
        let monitor = HealthMonitor::new(
            HealthMonitorConfig::for_environment(DeploymentEnvironment::Local),
            Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced)),
        );
        for _ in 0..3 {
            monitor.record_outcome("youtube", false, Some(ErrorCategory::Timeout)).await;
        }
        assert_eq!(monitor.status("youtube").await.unwrap().status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn network_errors_extend_threshold_by_two() {
        let monitor = HealthMonitor::new(
            HealthMonitorConfig::for_environment(DeploymentEnvironment::Local),
            Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced)),
        );
        for _ in 0..3 {
            monitor.record_outcome("youtube", false, Some(ErrorCategory::Network)).await;
        }
        assert_eq!(monitor.status("youtube").await.unwrap().status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let monitor = HealthMonitor::new(
            HealthMonitorConfig::for_environment(DeploymentEnvironment::Local),
            Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced)),
        );
        monitor.record_outcome("youtube", false, Some(ErrorCategory::Timeout)).await;
        monitor.record_outcome("youtube", true, None).await;
        assert_eq!(monitor.status("youtube").await.unwrap().consecutive_failures, 0);
    }

    struct FakePlatform {
        tag: &'static str,
    }

    #[async_trait::async_trait]
    impl Platform for FakePlatform {
        fn name(&self) -> &str {
            self.tag
        }

        async fn initialize(&self) -> crate::errors::BrokerResult<()> {
            Ok(())
        }

        async fn search(&self, _query: &str, _max: usize) -> crate::errors::BrokerResult<Vec<crate::models::VideoSummary>> {
            Err(crate::errors::PlatformError::Unavailable {
                platform: self.tag.to_string(),
                message: "boom".to_string(),
                instance_counts: None,
            })
        }

        async fn get_details(&self, _id: &str) -> crate::errors::BrokerResult<Option<crate::models::VideoDetails>> {
            Ok(None)
        }

        async fn extract_stream_url(&self, _id: &str) -> crate::errors::BrokerResult<Option<crate::models::StreamHandle>> {
            Ok(None)
        }

        fn classify_url(&self, _url: &str) -> Option<String> {
            None
        }

        async fn shutdown(&self) -> crate::errors::BrokerResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unhealthy_service_schedules_recovery_exactly_once() {
        let monitor = Arc::new(HealthMonitor::new(
            HealthMonitorConfig::for_environment(DeploymentEnvironment::Local),
            Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced)),
        ));
        for _ in 0..3 {
            monitor.record_outcome("rumble", false, Some(ErrorCategory::Timeout)).await;
        }
        let platform: Arc<dyn Platform> = Arc::new(FakePlatform { tag: "rumble" });

        monitor.clone().maybe_schedule_recovery(platform.clone(), HealthStatus::Unhealthy).await;
        assert!(monitor.recovering.read().await.contains("rumble"));

        // A second attempt while recovery is already in flight must not panic
        // or schedule a duplicate task.
        monitor.clone().maybe_schedule_recovery(platform, HealthStatus::Unhealthy).await;
    }
}
