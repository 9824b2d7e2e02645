//! Instance Health Tracker (§4.F), owned by the federated adapter.
//!
//! A `RwLock<HashMap<String, _>>` of per-endpoint state, created lazily.
//! `status = unhealthy` iff `consecutive_failures >= 3`, with a 5 minute
//! re-admission window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::errors::ErrorCategory;

const UNHEALTHY_THRESHOLD: u32 = 3;
const REINSTATEMENT_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct InstanceHealth {
    pub consecutive_failures: u32,
    #[serde(skip)]
    pub last_success_at: Option<Instant>,
    #[serde(skip)]
    pub last_failure_at: Option<Instant>,
    pub last_error_category: Option<ErrorCategory>,
    pub status: HealthStatus,
}

impl Default for InstanceHealth {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            last_error_category: None,
            status: HealthStatus::Healthy,
        }
    }
}

impl InstanceHealth {
    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success_at = Some(Instant::now());
        self.status = HealthStatus::Healthy;
    }

    fn record_failure(&mut self, category: ErrorCategory) {
        self.consecutive_failures += 1;
        self.last_failure_at = Some(Instant::now());
        self.last_error_category = Some(category);
        self.status = if self.consecutive_failures >= UNHEALTHY_THRESHOLD {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };
    }

    /// Whether this endpoint is eligible for fan-out right now.
    fn is_healthy(&self) -> bool {
        match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => true,
            HealthStatus::Unhealthy => self
                .last_failure_at
                .map(|t| t.elapsed() >= REINSTATEMENT_WINDOW)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthSnapshot {
    pub endpoint: String,
    pub health: InstanceHealth,
}

#[derive(Default)]
pub struct InstanceHealthTracker {
    endpoints: RwLock<HashMap<String, InstanceHealth>>,
}

impl InstanceHealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self, endpoint: &str) {
        let mut guard = self.endpoints.write().await;
        let entry = guard.entry(endpoint.to_string()).or_default();
        let was_unhealthy = entry.status == HealthStatus::Unhealthy;
        entry.record_success();
        if was_unhealthy {
            info!(endpoint, "instance reinstated after probe success");
        }
    }

    pub async fn record_failure(&self, endpoint: &str, category: ErrorCategory) {
        let mut guard = self.endpoints.write().await;
        let entry = guard.entry(endpoint.to_string()).or_default();
        entry.record_failure(category);
        if entry.status == HealthStatus::Unhealthy {
            warn!(endpoint, failures = entry.consecutive_failures, "instance marked unhealthy");
        }
    }

    pub async fn healthy(&self, endpoint: &str) -> bool {
        self.endpoints
            .read()
            .await
            .get(endpoint)
            .map(|h| h.is_healthy())
            .unwrap_or(true)
    }

    /// Filter `endpoints` down to the ones currently eligible for fan-out.
    pub async fn filter_healthy(&self, endpoints: &[String]) -> Vec<String> {
        let guard = self.endpoints.read().await;
        endpoints
            .iter()
            .filter(|e| guard.get(*e).map(|h| h.is_healthy()).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> Vec<HealthSnapshot> {
        self.endpoints
            .read()
            .await
            .iter()
            .map(|(endpoint, health)| HealthSnapshot {
                endpoint: endpoint.clone(),
                health: health.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn three_consecutive_failures_marks_unhealthy() {
        let tracker = InstanceHealthTracker::new();
        for _ in 0..2 {
            tracker.record_failure("a", ErrorCategory::Network).await;
        }
        assert!(tracker.healthy("a").await);
        tracker.record_failure("a", ErrorCategory::Network).await;
        assert!(!tracker.healthy("a").await);
    }

    #[tokio::test]
    async fn success_clears_failure_streak() {
        let tracker = InstanceHealthTracker::new();
        tracker.record_failure("a", ErrorCategory::Network).await;
        tracker.record_failure("a", ErrorCategory::Network).await;
        tracker.record_success("a").await;
        tracker.record_failure("a", ErrorCategory::Network).await;
        tracker.record_failure("a", ErrorCategory::Network).await;
        assert!(tracker.healthy("a").await);
    }

    #[tokio::test]
    async fn filter_healthy_excludes_unhealthy_endpoints() {
        let tracker = InstanceHealthTracker::new();
        for _ in 0..3 {
            tracker.record_failure("bad", ErrorCategory::Network).await;
        }
        tracker.record_success("good").await;
        let all = vec!["good".to_string(), "bad".to_string()];
        assert_eq!(tracker.filter_healthy(&all).await, vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn unknown_endpoint_defaults_healthy() {
        let tracker = InstanceHealthTracker::new();
        assert!(tracker.healthy("never-seen").await);
    }
}
