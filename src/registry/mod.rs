//! Registry (§4.J): owns all source adapters, dispatches by URL or priority.
//!
//! A `HashMap` of named adapters behind `Arc`, built once at startup. A
//! query either names a direct URL (handled by the one adapter that claims
//! it) or is tried against adapters in Prioritizer order until one succeeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{BrokerResult, PlatformError};
use crate::fallback::FallbackEngine;
use crate::models::{StreamHandle, VideoDetails, VideoSummary};
use crate::platform::Platform;
use crate::prioritizer::Prioritizer;

/// Owns every configured source adapter and routes calls to them either by
/// URL ownership or by the Prioritizer's current ordering.
pub struct Registry {
    platforms: HashMap<String, Arc<dyn Platform>>,
    prioritizer: Arc<Prioritizer>,
    fallback: Arc<FallbackEngine>,
}

impl Registry {
    pub fn new(platforms: Vec<Arc<dyn Platform>>, prioritizer: Arc<Prioritizer>, fallback: Arc<FallbackEngine>) -> Self {
        let mut map = HashMap::new();
        for platform in platforms {
            map.insert(platform.name().to_string(), platform);
        }
        Self {
            platforms: map,
            prioritizer,
            fallback,
        }
    }

    /// The first adapter whose URL-pattern table claims `url`, if any.
    pub fn adapter_for_url(&self, url: &str) -> Option<Arc<dyn Platform>> {
        self.platforms.values().find(|p| p.owns_url(url)).cloned()
    }

    pub fn adapter(&self, name: &str) -> Option<Arc<dyn Platform>> {
        self.platforms.get(name).cloned()
    }

    pub fn platform_names(&self) -> Vec<String> {
        self.platforms.keys().cloned().collect()
    }

    /// All adapters, for callers (the Health Monitor) that probe every
    /// registered platform rather than dispatching a single request.
    pub fn platform_list(&self) -> Vec<Arc<dyn Platform>> {
        self.platforms.values().cloned().collect()
    }

    /// Defers to the Prioritizer for the current ordering of every
    /// registered platform.
    pub async fn platforms_by_priority(&self) -> Vec<Arc<dyn Platform>> {
        let names = self.platform_names();
        let order = self.prioritizer.order(&names).await;
        order.into_iter().filter_map(|name| self.platforms.get(&name).cloned()).collect()
    }

    /// Calls `initialize()` on every adapter.
    pub async fn start_all(&self) -> BrokerResult<()> {
        for (name, platform) in &self.platforms {
            info!(platform = name.as_str(), "initializing platform adapter");
            platform.initialize().await?;
        }
        Ok(())
    }

    /// Calls `shutdown()` on every adapter, logging (not propagating)
    /// individual failures so one misbehaving adapter never blocks teardown
    /// of the rest.
    pub async fn stop_all(&self) {
        for (name, platform) in &self.platforms {
            if let Err(err) = platform.shutdown().await {
                warn!(platform = name.as_str(), %err, "error shutting down platform adapter");
            }
        }
    }

    /// Top-level search entry point (§2 flow): a direct URL is handled by
    /// the one adapter that owns it; anything else is tried against
    /// adapters in Prioritizer order until one succeeds, honoring any
    /// active Fallback Engine restriction on `search` for that platform.
    pub async fn search(&self, query: &str, max: usize) -> BrokerResult<Vec<VideoSummary>> {
        let request_id = Uuid::new_v4();

        if let Some(platform) = self.adapter_for_url(query) {
            debug!(%request_id, platform = platform.name(), "direct url dispatch");
            return self.call_and_record(platform, |p| async move { p.search(query, max).await }).await;
        }

        let candidates = self.platforms_by_priority().await;
        let mut last_error = None;

        for platform in candidates {
            let name = platform.name().to_string();
            let (restricted, reason) = self.fallback.restricted(&name, "search").await;
            if restricted {
                debug!(%request_id, platform = name.as_str(), ?reason, "search restricted by active fallback mode, skipping");
                continue;
            }

            match self.call_and_record(platform, |p| async move { p.search(query, max).await }).await {
                Ok(results) => {
                    info!(%request_id, platform = name.as_str(), hits = results.len(), "search succeeded");
                    return Ok(results);
                }
                Err(err) => {
                    warn!(%request_id, platform = name.as_str(), %err, "search failed, trying next platform");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PlatformError::Unavailable {
            platform: "registry".to_string(),
            message: "no platforms available to handle this query".to_string(),
            instance_counts: None,
        }))
    }

    pub async fn get_details(&self, platform: &str, id: &str) -> BrokerResult<Option<VideoDetails>> {
        let adapter = self.require(platform)?;
        adapter.get_details(id).await
    }

    pub async fn get_details_for_url(&self, url: &str) -> BrokerResult<Option<VideoDetails>> {
        let adapter = self.adapter_for_url(url).ok_or_else(|| Self::unrecognized_url(url))?;
        let id = adapter.classify_url(url).ok_or_else(|| Self::unrecognized_url(url))?;
        adapter.get_details(&id).await
    }

    pub async fn extract_stream_url(&self, platform: &str, id: &str) -> BrokerResult<Option<StreamHandle>> {
        let adapter = self.require(platform)?;
        adapter.extract_stream_url(id).await
    }

    pub async fn extract_stream_url_for_url(&self, url: &str) -> BrokerResult<Option<StreamHandle>> {
        let adapter = self.adapter_for_url(url).ok_or_else(|| Self::unrecognized_url(url))?;
        let id = adapter.classify_url(url).ok_or_else(|| Self::unrecognized_url(url))?;
        adapter.extract_stream_url(&id).await
    }

    /// Quality-selectable stream extraction (§4.E.2). Only Rumble's adapter
    /// supports choosing a quality below its best; every other adapter
    /// falls back to its uniform `extract_stream_url`.
    pub async fn extract_stream_url_with_quality(
        &self,
        platform: &str,
        id: &str,
        quality: crate::sources::rumble::StreamQuality,
    ) -> BrokerResult<Option<StreamHandle>> {
        let adapter = self.require(platform)?;
        if let Some(rumble) = adapter.as_any().downcast_ref::<crate::sources::rumble::RumblePlatform>() {
            return rumble.extract_stream_audio(id, quality).await;
        }
        adapter.extract_stream_url(id).await
    }

    fn require(&self, platform: &str) -> BrokerResult<Arc<dyn Platform>> {
        self.adapter(platform).ok_or_else(|| PlatformError::NotFound {
            platform: platform.to_string(),
            message: "platform not configured".to_string(),
        })
    }

    fn unrecognized_url(url: &str) -> PlatformError {
        PlatformError::NotFound {
            platform: "registry".to_string(),
            message: format!("no adapter recognizes url: {url}"),
        }
    }

    /// Run `op` against `platform`, timing it and feeding the outcome back
    /// into the Prioritizer regardless of success or failure.
    async fn call_and_record<F, Fut>(&self, platform: Arc<dyn Platform>, op: F) -> BrokerResult<Vec<VideoSummary>>
    where
        F: FnOnce(Arc<dyn Platform>) -> Fut,
        Fut: std::future::Future<Output = BrokerResult<Vec<VideoSummary>>>,
    {
        let name = platform.name().to_string();
        let start = Instant::now();
        let result = op(platform).await;
        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(_) => self.prioritizer.record(&name, true, elapsed, None).await,
            Err(err) => self.prioritizer.record(&name, false, elapsed, Some(err.category())).await,
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackEngine;
    use crate::prioritizer::PrioritizationStrategy;
    use async_trait::async_trait;

    struct FakePlatform {
        tag: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Platform for FakePlatform {
        fn name(&self) -> &str {
            self.tag
        }

        async fn initialize(&self) -> BrokerResult<()> {
            Ok(())
        }

        async fn search(&self, _query: &str, _max: usize) -> BrokerResult<Vec<VideoSummary>> {
            if self.fail {
                Err(PlatformError::Unavailable {
                    platform: self.tag.to_string(),
                    message: "boom".to_string(),
                    instance_counts: None,
                })
            } else {
                Ok(vec![VideoSummary {
                    id: "x".to_string(),
                    title: "t".to_string(),
                    channel: "c".to_string(),
                    thumbnail_url: None,
                    canonical_url: "https://example.com/x".to_string(),
                    platform_tag: self.tag.to_string(),
                    description: None,
                    duration_seconds: None,
                    views: None,
                    instance: None,
                }])
            }
        }

        async fn get_details(&self, _id: &str) -> BrokerResult<Option<VideoDetails>> {
            Ok(None)
        }

        async fn extract_stream_url(&self, _id: &str) -> BrokerResult<Option<StreamHandle>> {
            Ok(None)
        }

        fn classify_url(&self, _url: &str) -> Option<String> {
            None
        }

        async fn shutdown(&self) -> BrokerResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn search_falls_through_to_next_platform_on_failure() {
        let prioritizer = Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced));
        let fallback = Arc::new(FallbackEngine::new());
        let registry = Registry::new(
            vec![
                Arc::new(FakePlatform { tag: "failing", fail: true }),
                Arc::new(FakePlatform { tag: "working", fail: false }),
            ],
            prioritizer,
            fallback,
        );

        let results = registry.search("some query", 5).await.unwrap();
        assert_eq!(results[0].platform_tag, "working");
    }

    #[tokio::test]
    async fn search_with_no_platforms_returns_unavailable() {
        let prioritizer = Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced));
        let fallback = Arc::new(FallbackEngine::new());
        let registry = Registry::new(vec![], prioritizer, fallback);
        let err = registry.search("q", 5).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn unknown_platform_lookup_is_not_found() {
        let prioritizer = Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced));
        let fallback = Arc::new(FallbackEngine::new());
        let registry = Registry::new(vec![], prioritizer, fallback);
        let err = registry.get_details("nope", "1").await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn quality_extraction_reaches_rumble_adapter_not_the_uniform_path() {
        use crate::cache::InMemoryCache;
        use crate::http_router::{HttpRouter, RoutingConfig};
        use crate::resilience::{CircuitBreakerConfig, ResilienceManager};
        use crate::sources::rumble::{RumblePlatform, StreamQuality};

        let http_router = Arc::new(HttpRouter::new(RoutingConfig::from_env()));
        let resilience = Arc::new(ResilienceManager::new(CircuitBreakerConfig::default()));
        let cache = Arc::new(InMemoryCache::new());
        let rumble = Arc::new(RumblePlatform::new(None, "actor-id", http_router, resilience, cache));

        let prioritizer = Arc::new(Prioritizer::new(PrioritizationStrategy::Balanced));
        let fallback = Arc::new(FallbackEngine::new());
        let registry = Registry::new(vec![rumble], prioritizer, fallback);

        // No actor token configured: both paths fail the same way, but only
        // the downcast path is exercised here (a `Medium` request the
        // uniform `extract_stream_url` signature has no way to express).
        let err = registry.extract_stream_url_with_quality("rumble", "abc", StreamQuality::Medium).await.unwrap_err();
        assert!(matches!(err, PlatformError::AuthRequired { .. }));
    }
}
