//! The root `App` value (§9 "Replacing global singletons"): Resilience
//! Kernel, HTTP Router, Prioritizer and Fallback Engine are process-wide in
//! the original but are owned here explicitly rather than as statics, so
//! tests can build independent instances freely.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::{CachePort, InMemoryCache, NoopCache};
use crate::config::{BrokerConfig, CacheBackend};
use crate::errors::BrokerResult;
use crate::fallback::{FallbackEngine, FallbackReport};
use crate::health_monitor::{DeploymentEnvironment, HealthMonitor, HealthMonitorConfig, ServiceHealth};
use crate::http_router::HttpRouter;
use crate::models::ServiceType;
use crate::platform::Platform;
use crate::prioritizer::{PlatformMetrics, Prioritizer};
use crate::registry::Registry;
use crate::resilience::{CircuitBreakerConfig, ResilienceManager};
use crate::sources::media_info::{ExternalMediaInfoExtractor, MediaInfoExtractor};
use crate::sources::{OdyseePlatform, PeertubePlatform, RumblePlatform, YoutubePlatform};

#[derive(Debug, Clone, Serialize)]
pub struct RoutingInfo {
    pub strategy: String,
    pub vpn_interface: Option<String>,
    pub direct_interface: Option<String>,
    pub per_service_vpn: HashMap<String, bool>,
}

/// Owns every process-wide component and the registry of source adapters
/// built from them. Constructed once at startup, torn down at shutdown.
pub struct App {
    pub http_router: Arc<HttpRouter>,
    pub resilience: Arc<ResilienceManager>,
    pub cache: Arc<dyn CachePort>,
    pub fallback: Arc<FallbackEngine>,
    pub prioritizer: Arc<Prioritizer>,
    pub health_monitor: Arc<HealthMonitor>,
    pub registry: Arc<Registry>,
    pub deployment_env: DeploymentEnvironment,
}

impl App {
    pub fn from_config(config: &BrokerConfig) -> Self {
        let deployment_env = DeploymentEnvironment::detect();
        info!(?deployment_env, "detected deployment environment");

        let http_router = Arc::new(HttpRouter::new(crate::http_router::RoutingConfig::from_env()));
        let resilience = Arc::new(ResilienceManager::new(CircuitBreakerConfig::default()));
        let cache: Arc<dyn CachePort> = match config.cache_backend {
            CacheBackend::Memory => Arc::new(InMemoryCache::new()),
            CacheBackend::None => Arc::new(NoopCache::default()),
        };
        let fallback = Arc::new(FallbackEngine::new());
        let prioritizer = Arc::new(Prioritizer::new(config.prioritization_strategy));
        let health_monitor = Arc::new(HealthMonitor::new(HealthMonitorConfig::for_environment(deployment_env), prioritizer.clone()));

        let extractor: Arc<dyn MediaInfoExtractor> = Arc::new(ExternalMediaInfoExtractor {
            binary_path: std::env::var("MEDIA_INFO_BINARY").unwrap_or_else(|_| "yt-dlp".to_string()),
        });

        let mut platforms: Vec<Arc<dyn Platform>> = Vec::new();

        if config.youtube.enabled {
            platforms.push(Arc::new(YoutubePlatform::new(
                config.youtube.api_key.clone(),
                config.youtube.cookie_file.as_ref().map(|p| p.to_string_lossy().to_string()),
                http_router.clone(),
                resilience.clone(),
                cache.clone(),
                fallback.clone(),
                extractor.clone(),
            )));
        }

        if config.rumble.enabled {
            platforms.push(Arc::new(RumblePlatform::new(
                config.rumble.api_token.clone(),
                config.rumble.actor_id.clone(),
                http_router.clone(),
                resilience.clone(),
                cache.clone(),
            )));
        }

        if config.odysee.enabled {
            platforms.push(Arc::new(OdyseePlatform::new(http_router.clone(), resilience.clone(), cache.clone())));
        }

        if config.peertube.enabled {
            platforms.push(Arc::new(PeertubePlatform::new(
                config.peertube.instances.clone(),
                http_router.clone(),
                resilience.clone(),
                cache.clone(),
            )));
        }

        let registry = Arc::new(Registry::new(platforms, prioritizer.clone(), fallback.clone()));

        Self {
            http_router,
            resilience,
            cache,
            fallback,
            prioritizer,
            health_monitor,
            registry,
            deployment_env,
        }
    }

    pub async fn start(&self) -> BrokerResult<()> {
        self.registry.start_all().await
    }

    /// Spawn the Health Monitor's probe loop and the Fallback Engine's
    /// monitoring loop as independent tasks sharing one cancellation token
    /// (§5: all long-running work runs as independent tasks on one loop).
    pub async fn run_background_tasks(&self, cancellation_token: CancellationToken) {
        let platforms = self.registry.platform_list();
        let health_monitor = self.health_monitor.clone();
        let fallback = self.fallback.clone();
        let health_token = cancellation_token.clone();
        let fallback_token = cancellation_token.clone();

        tokio::join!(
            async move { health_monitor.run(&platforms, health_token).await },
            async move { fallback.run_monitor(fallback_token).await },
        );
    }

    pub async fn shutdown(&self) {
        self.registry.stop_all().await;
        self.http_router.shutdown().await;
    }

    pub async fn health_report(&self) -> HashMap<String, ServiceHealth> {
        self.health_monitor.report().await
    }

    pub async fn fallback_report(&self) -> FallbackReport {
        self.fallback.report().await
    }

    pub async fn prioritizer_summary(&self) -> HashMap<String, PlatformMetrics> {
        self.prioritizer.metrics_summary().await
    }

    pub fn routing_info(&self) -> RoutingInfo {
        let routing = self.http_router.routing();
        let mut per_service_vpn = HashMap::new();
        for service in [ServiceType::Discord, ServiceType::Youtube, ServiceType::Rumble, ServiceType::Odysee, ServiceType::Peertube] {
            per_service_vpn.insert(service.as_str().to_string(), routing.service_uses_vpn(service));
        }
        RoutingInfo {
            strategy: format!("{:?}", routing.strategy),
            vpn_interface: routing.vpn_interface.clone(),
            direct_interface: routing.direct_interface.clone(),
            per_service_vpn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config_with_all_platforms_enabled() {
        let config = BrokerConfig::default();
        let app = App::from_config(&config);
        let mut names = app.registry.platform_names();
        names.sort();
        assert_eq!(names, vec!["odysee", "peertube", "rumble", "youtube"]);
    }
}
