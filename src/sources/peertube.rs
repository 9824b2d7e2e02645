//! Federated, self-hosted platform adapter (PeerTube-shape), §4.E.3.
//!
//! Unlike the other three adapters this one owns *many* upstream endpoints
//! instead of one: `search` fans out to every healthy instance concurrently
//! (staggered by 50ms so a flood of near-simultaneous circuit-breaker trips
//! doesn't thundering-herd the health tracker), tolerates partial failure,
//! and merges what comes back. `get_details`/`extract_stream_url` only need
//! one instance to answer, so they walk the instance list in priority order
//! and stop at the first 200.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::cache::{CachePort, DEFAULT_METADATA_TTL};
use crate::errors::{BrokerResult, ErrorCategory, PlatformError, TransportError};
use crate::http_router::HttpRouter;
use crate::instance_health::InstanceHealthTracker;
use crate::models::{ServiceType, StreamHandle, VideoDetails, VideoSummary};
use crate::platform::{cache_wrap, url_patterns, Platform};
use crate::resilience::{with_retry, ResilienceManager, RetryPolicy};

const STAGGER: Duration = Duration::from_millis(50);
const PER_INSTANCE_BUDGET: Duration = Duration::from_secs(15);
const MAX_FANOUT_DEADLINE: Duration = Duration::from_secs(45);

pub struct PeertubePlatform {
    instances: Vec<String>,
    http_router: Arc<HttpRouter>,
    resilience: Arc<ResilienceManager>,
    cache: Arc<dyn CachePort>,
    health: Arc<InstanceHealthTracker>,
    retry_policy: RetryPolicy,
}

impl PeertubePlatform {
    pub fn new(instances: Vec<String>, http_router: Arc<HttpRouter>, resilience: Arc<ResilienceManager>, cache: Arc<dyn CachePort>) -> Self {
        Self {
            instances,
            http_router,
            resilience,
            cache,
            health: Arc::new(InstanceHealthTracker::new()),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Priority order for single-instance lookups: last-known-healthy
    /// instances first, falling back to the configured order.
    async fn priority_order(&self) -> Vec<String> {
        let healthy = self.health.filter_healthy(&self.instances).await;
        let mut ordered: Vec<String> = healthy;
        for instance in &self.instances {
            if !ordered.contains(instance) {
                ordered.push(instance.clone());
            }
        }
        ordered
    }

    /// GET `{instance}{path}`, classified and retried under a per-instance
    /// circuit breaker. A 403 is treated per §9's Open Question: logged as a
    /// possible auth wall, not surfaced as `AuthRequired` -- the caller sees
    /// an empty/`None` result for this instance instead.
    async fn get_json(&self, instance: &str, path: &str) -> Result<Option<serde_json::Value>, TransportError> {
        let session = self.http_router.acquire(ServiceType::Peertube).await;
        let breaker_key = format!("peertube:{instance}");
        let breaker = self.resilience.get_or_create(&breaker_key).await;
        let client = session.client.clone();
        let url = format!("{instance}{path}");

        let result = with_retry(
            || {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let resp = client.get(&url).send().await.map_err(|e| TransportError::from_reqwest(&e))?;
                    if resp.status().as_u16() == 403 {
                        return Ok(None);
                    }
                    if !resp.status().is_success() {
                        return Err(TransportError::new(ErrorCategory::from_status(resp.status().as_u16()), resp.status().to_string()));
                    }
                    let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::from_reqwest(&e))?;
                    Ok(Some(body))
                }
            },
            &self.retry_policy,
            Some(&breaker),
        )
        .await;

        match result {
            Ok(value) => {
                self.health.record_success(instance).await;
                Ok(value)
            }
            Err(exhausted) => {
                self.health.record_failure(instance, exhausted.last_error.category).await;
                Err(exhausted.last_error)
            }
        }
    }
}

fn parse_videos(instance: &str, value: &serde_json::Value) -> Vec<VideoSummary> {
    value["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let uuid = item["uuid"].as_str()?.to_string();
                    Some(VideoSummary {
                        id: uuid.clone(),
                        title: item["name"].as_str().unwrap_or_default().to_string(),
                        channel: item["channel"]["displayName"].as_str().unwrap_or_default().to_string(),
                        thumbnail_url: item["thumbnailPath"].as_str().map(|p| format!("{instance}{p}")),
                        canonical_url: format!("{instance}/w/{uuid}"),
                        platform_tag: "peertube".to_string(),
                        description: item["description"].as_str().map(str::to_string),
                        duration_seconds: item["duration"].as_u64(),
                        views: item["views"].as_u64(),
                        instance: Some(instance.to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Platform for PeertubePlatform {
    fn name(&self) -> &str {
        "peertube"
    }

    async fn initialize(&self) -> BrokerResult<()> {
        Ok(())
    }

    /// Fans out to every healthy instance concurrently with a 50ms stagger
    /// between launches, under a global deadline of `min(45s, healthy*15s)`.
    /// Partial success is returned as long as at least one instance answers;
    /// only raises `Unavailable` if every instance failed (§4.E.3).
    async fn search(&self, query: &str, max: usize) -> BrokerResult<Vec<VideoSummary>> {
        let cache = self.cache.clone();
        let query_owned = query.to_string();

        cache_wrap::search_with_cache(&cache, "peertube", query, None, || async move {
            let healthy = self.health.filter_healthy(&self.instances).await;
            let total = healthy.len().max(self.instances.len());
            if healthy.is_empty() {
                return Err(PlatformError::Unavailable {
                    platform: "peertube".to_string(),
                    message: "all instances failed".to_string(),
                    instance_counts: Some((total, total)),
                });
            }

            let deadline = MAX_FANOUT_DEADLINE.min(PER_INSTANCE_BUDGET * healthy.len() as u32);

            let mut handles = Vec::with_capacity(healthy.len());
            for (idx, instance) in healthy.iter().enumerate() {
                let instance = instance.clone();
                let query = query_owned.clone();
                let path = format!("/api/v1/search/videos?search={}&count={max}", urlencoding::encode(&query));
                let this_instance = instance.clone();
                let fut = async move {
                    tokio::time::sleep(STAGGER * idx as u32).await;
                    self.get_json(&this_instance, &path).await.map(|maybe| maybe.map(|v| parse_videos(&this_instance, &v)))
                };
                handles.push(tokio::time::timeout(deadline, fut));
            }

            let outcomes = futures::future::join_all(handles).await;

            let mut merged = Vec::new();
            let mut failed = 0usize;
            for outcome in outcomes {
                match outcome {
                    Ok(Ok(Some(videos))) => merged.extend(videos),
                    Ok(Ok(None)) => {
                        warn!("peertube instance returned 403, treating as empty");
                    }
                    Ok(Err(_)) | Err(_) => failed += 1,
                }
            }

            if merged.is_empty() && failed == healthy.len() {
                return Err(PlatformError::Unavailable {
                    platform: "peertube".to_string(),
                    message: format!("all {total} instances failed"),
                    instance_counts: Some((failed, total)),
                });
            }

            merged.sort_by(|a, b| b.views.unwrap_or(0).cmp(&a.views.unwrap_or(0)));
            merged.truncate(max);
            Ok(merged)
        })
        .await
    }

    async fn get_details(&self, id: &str) -> BrokerResult<Option<VideoDetails>> {
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::details_with_cache(&cache, "peertube", id, Some(DEFAULT_METADATA_TTL), || async move {
            let order = self.priority_order().await;
            for instance in order {
                let path = format!("/api/v1/videos/{id_owned}");
                match self.get_json(&instance, &path).await {
                    Ok(Some(value)) => {
                        return Ok(Some(VideoDetails {
                            summary: VideoSummary {
                                id: id_owned.clone(),
                                title: value["name"].as_str().unwrap_or_default().to_string(),
                                channel: value["channel"]["displayName"].as_str().unwrap_or_default().to_string(),
                                thumbnail_url: value["thumbnailPath"].as_str().map(|p| format!("{instance}{p}")),
                                canonical_url: format!("{instance}/w/{id_owned}"),
                                platform_tag: "peertube".to_string(),
                                description: value["description"].as_str().map(str::to_string),
                                duration_seconds: value["duration"].as_u64(),
                                views: value["views"].as_u64(),
                                instance: Some(instance.clone()),
                            },
                            likes: value["likes"].as_u64(),
                            dislikes: value["dislikes"].as_u64(),
                            published_at: None,
                            available_qualities: vec![],
                        }));
                    }
                    Ok(None) => continue,
                    Err(_) => continue,
                }
            }
            Ok(None)
        })
        .await
    }

    async fn extract_stream_url(&self, id: &str) -> BrokerResult<Option<StreamHandle>> {
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::stream_url_with_cache(&cache, "peertube", id, "auto", Some(Duration::from_secs(30 * 60)), || async move {
            let order = self.priority_order().await;
            for instance in order {
                let path = format!("/api/v1/videos/{id_owned}");
                if let Ok(Some(value)) = self.get_json(&instance, &path).await {
                    if let Some(url) = value["streamingPlaylists"][0]["playlistUrl"].as_str() {
                        return Ok(Some(StreamHandle::expiring_in(url.to_string(), "auto", 30, Utc::now())));
                    }
                    if let Some(url) = value["files"][0]["fileUrl"].as_str() {
                        return Ok(Some(StreamHandle::expiring_in(url.to_string(), "auto", 30, Utc::now())));
                    }
                }
            }
            Ok(None)
        })
        .await
    }

    fn classify_url(&self, url: &str) -> Option<String> {
        self.instances
            .iter()
            .find_map(|instance| url_patterns::classify_peertube(url).filter(|(base, _)| base == instance).map(|(_, uuid)| uuid))
            .or_else(|| url_patterns::classify_peertube(url).map(|(_, uuid)| uuid))
    }

    async fn shutdown(&self) -> BrokerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_videos_tags_instance_origin() {
        let value = serde_json::json!({
            "data": [{"uuid": "abc", "name": "t", "channel": {"displayName": "c"}, "views": 10}]
        });
        let videos = parse_videos("https://tilvids.com", &value);
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].instance.as_deref(), Some("https://tilvids.com"));
        assert_eq!(videos[0].canonical_url, "https://tilvids.com/w/abc");
    }

    #[test]
    fn parse_videos_skips_items_without_uuid() {
        let value = serde_json::json!({ "data": [{"name": "no uuid"}] });
        assert!(parse_videos("https://tilvids.com", &value).is_empty());
    }
}
