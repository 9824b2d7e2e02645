//! Per-service circuit breaker manager
//!
//! A registry keyed by service name that creates breakers lazily and
//! idempotently, so callers never have to coordinate who constructs the
//! breaker for "youtube" first.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};

#[derive(Debug, Clone, Default)]
pub struct ResilienceManager {
    breakers: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl ResilienceManager {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Arc::new(RwLock::new(HashMap::new())),
            default_config,
        }
    }

    /// Return the breaker for `service`, creating it with the default config
    /// the first time it's requested.
    pub async fn get_or_create(&self, service: &str) -> CircuitBreaker {
        if let Some(existing) = self.breakers.read().await.get(service) {
            return existing.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                info!(service, "creating circuit breaker");
                CircuitBreaker::new(service, self.default_config.clone())
            })
            .clone()
    }

    /// Create (or replace) a breaker for `service` with a non-default config,
    /// e.g. a federated instance that needs a looser threshold.
    pub async fn get_or_create_with(&self, service: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        if let Some(existing) = self.breakers.read().await.get(service) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service.to_string())
            .or_insert_with(|| CircuitBreaker::new(service, config))
            .clone()
    }

    pub async fn force_open(&self, service: &str) {
        if let Some(cb) = self.breakers.read().await.get(service) {
            cb.force_open().await;
        }
    }

    pub async fn force_closed(&self, service: &str) {
        if let Some(cb) = self.breakers.read().await.get(service) {
            cb.force_closed().await;
        }
    }

    pub async fn list_active(&self) -> Vec<String> {
        self.breakers.read().await.keys().cloned().collect()
    }

    pub async fn stats(&self, service: &str) -> Option<CircuitBreakerStats> {
        match self.breakers.read().await.get(service) {
            Some(cb) => Some(cb.stats().await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let manager = ResilienceManager::new(CircuitBreakerConfig::default());
        let a = manager.get_or_create("youtube").await;
        let b = manager.get_or_create("youtube").await;
        a.force_open().await;
        assert_eq!(b.state().await, crate::resilience::CircuitState::Open);
    }

    #[tokio::test]
    async fn list_active_reflects_created_services() {
        let manager = ResilienceManager::new(CircuitBreakerConfig::default());
        manager.get_or_create("youtube").await;
        manager.get_or_create("rumble").await;
        let mut active = manager.list_active().await;
        active.sort();
        assert_eq!(active, vec!["rumble".to_string(), "youtube".to_string()]);
    }
}
