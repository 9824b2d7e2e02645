//! Dynamic Platform Prioritizer (§4.H)
//!
//! Rolling response-time window, three sub-score formulas, strategy weight
//! table, and 60s order-caching. See `DESIGN.md` for the one deliberate
//! deviation: the adaptive ">80% healthy" branch reuses the `speed_first`
//! weights rather than an otherwise-unspecified distinct tuple.

mod metrics;
mod strategy;

pub use metrics::PlatformMetrics;
pub use strategy::{PrioritizationStrategy, StrategyWeights};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::ErrorCategory;
use crate::instance_health::HealthStatus;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

struct Cache {
    order: Vec<String>,
    computed_at: Instant,
}

pub struct Prioritizer {
    metrics: RwLock<HashMap<String, PlatformMetrics>>,
    strategy: RwLock<PrioritizationStrategy>,
    cache: RwLock<Option<Cache>>,
    update_interval: Duration,
}

impl Prioritizer {
    pub fn new(strategy: PrioritizationStrategy) -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
            strategy: RwLock::new(strategy),
            cache: RwLock::new(None),
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }

    pub async fn set_strategy(&self, strategy: PrioritizationStrategy) {
        *self.strategy.write().await = strategy;
        *self.cache.write().await = None;
    }

    /// Record the outcome of one operation against `platform`.
    pub async fn record(&self, platform: &str, success: bool, response_time_s: f64, _error_category: Option<ErrorCategory>) {
        let mut guard = self.metrics.write().await;
        let entry = guard.entry(platform.to_string()).or_insert_with(PlatformMetrics::new);
        entry.record(success, response_time_s);
        let strategy = *self.strategy.read().await;
        let unhealthy_fraction = Self::unhealthy_fraction(&guard);
        let healthy_fraction = Self::healthy_fraction(&guard);
        guard.get_mut(platform).unwrap().recompute(strategy, unhealthy_fraction, healthy_fraction);
        *self.cache.write().await = None;
        debug!(platform, success, response_time_s, "recorded platform operation");
    }

    /// Feed a health status update from the Health Monitor (§4.I) in.
    pub async fn update_health(&self, platform: &str, status: HealthStatus) {
        let mut guard = self.metrics.write().await;
        let entry = guard.entry(platform.to_string()).or_insert_with(PlatformMetrics::new);
        entry.current_health = Some(status);
        entry.health_score = match status {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.7,
            HealthStatus::Unhealthy => 0.3,
        };
        let strategy = *self.strategy.read().await;
        let unhealthy_fraction = Self::unhealthy_fraction(&guard);
        let healthy_fraction = Self::healthy_fraction(&guard);
        guard.get_mut(platform).unwrap().recompute(strategy, unhealthy_fraction, healthy_fraction);
        *self.cache.write().await = None;
    }

    fn unhealthy_fraction(metrics: &HashMap<String, PlatformMetrics>) -> f64 {
        if metrics.is_empty() {
            return 0.0;
        }
        let unhealthy = metrics.values().filter(|m| m.current_health == Some(HealthStatus::Unhealthy)).count();
        unhealthy as f64 / metrics.len() as f64
    }

    fn healthy_fraction(metrics: &HashMap<String, PlatformMetrics>) -> f64 {
        if metrics.is_empty() {
            return 0.0;
        }
        let healthy = metrics.values().filter(|m| m.current_health == Some(HealthStatus::Healthy)).count();
        healthy as f64 / metrics.len() as f64
    }

    /// Ordered list of `available_platforms`, highest score first. Caches the
    /// computed order for `update_interval` (default 60s).
    pub async fn order(&self, available_platforms: &[String]) -> Vec<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.computed_at.elapsed() < self.update_interval {
                    return cached.order.iter().filter(|p| available_platforms.contains(p)).cloned().collect();
                }
            }
        }

        let guard = self.metrics.read().await;
        let mut scored: Vec<(String, f64)> = available_platforms
            .iter()
            .map(|p| {
                let score = guard.get(p).map(|m| m.overall_score).unwrap_or(0.5);
                (p.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let order: Vec<String> = scored.into_iter().map(|(p, _)| p).collect();

        *self.cache.write().await = Some(Cache {
            order: order.clone(),
            computed_at: Instant::now(),
        });
        order
    }

    pub async fn metrics_summary(&self) -> HashMap<String, PlatformMetrics> {
        self.metrics.read().await.clone()
    }

    pub async fn reset(&self, platform: Option<&str>) {
        let mut guard = self.metrics.write().await;
        match platform {
            Some(p) => {
                guard.insert(p.to_string(), PlatformMetrics::new());
            }
            None => guard.clear(),
        }
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn speed_first_orders_by_response_time() {
        let prioritizer = Prioritizer::new(PrioritizationStrategy::SpeedFirst);
        for _ in 0..6 {
            prioritizer.record("a", true, 0.2, None).await;
            prioritizer.record("b", true, 4.0, None).await;
        }
        let order = prioritizer.order(&["a".to_string(), "b".to_string()]).await;
        assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn reliability_first_flips_priority_after_failures() {
        let prioritizer = Prioritizer::new(PrioritizationStrategy::ReliabilityFirst);
        for _ in 0..6 {
            prioritizer.record("a", true, 0.2, None).await;
            prioritizer.record("b", true, 4.0, None).await;
        }
        for _ in 0..4 {
            prioritizer.record("a", false, 0.2, Some(ErrorCategory::Network)).await;
        }
        let order = prioritizer.order(&["a".to_string(), "b".to_string()]).await;
        assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn unknown_platform_scores_neutral() {
        let prioritizer = Prioritizer::new(PrioritizationStrategy::Balanced);
        let order = prioritizer.order(&["never-seen".to_string()]).await;
        assert_eq!(order, vec!["never-seen".to_string()]);
    }
}
