//! Paid-actor scraping platform adapter (Rumble-shape), §4.E.2.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::cache::{CachePort, DEFAULT_METADATA_TTL};
use crate::errors::{BrokerResult, ErrorCategory, PlatformError, TransportError};
use crate::http_router::HttpRouter;
use crate::models::{ServiceType, StreamHandle, VideoDetails, VideoSummary};
use crate::platform::{cache_wrap, url_patterns, Platform};
use crate::resilience::{with_retry, ResilienceManager, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamQuality {
    Best,
    Medium,
    Low,
}

/// Quality mapping per §4.E.2: streams sorted by resolution desc;
/// `best -> [0]`, `medium -> [n/2]`, `low -> [n-1]`.
pub fn pick_by_quality<'a>(streams_desc: &'a [String], quality: StreamQuality) -> Option<&'a str> {
    if streams_desc.is_empty() {
        return None;
    }
    let idx = match quality {
        StreamQuality::Best => 0,
        StreamQuality::Medium => streams_desc.len() / 2,
        StreamQuality::Low => streams_desc.len() - 1,
    };
    streams_desc.get(idx).map(String::as_str)
}

#[derive(Serialize)]
struct ActorPayload<'a> {
    operation: &'a str,
    query: Option<&'a str>,
    url: Option<&'a str>,
    max_results: Option<usize>,
}

pub struct RumblePlatform {
    api_token: Option<String>,
    actor_id: String,
    http_router: Arc<HttpRouter>,
    resilience: Arc<ResilienceManager>,
    cache: Arc<dyn CachePort>,
    retry_policy: RetryPolicy,
    actor_timeout: Duration,
}

impl RumblePlatform {
    pub fn new(
        api_token: Option<String>,
        actor_id: impl Into<String>,
        http_router: Arc<HttpRouter>,
        resilience: Arc<ResilienceManager>,
        cache: Arc<dyn CachePort>,
    ) -> Self {
        Self {
            api_token,
            actor_id: actor_id.into(),
            http_router,
            resilience,
            cache,
            retry_policy: RetryPolicy::default(),
            actor_timeout: Duration::from_secs(60),
        }
    }

    /// Call the named actor with a JSON payload and wait for its dataset
    /// result, bounded by `actor_timeout` (default 60s); on timeout, raise
    /// `Unavailable` (§4.E.2).
    async fn call_actor(&self, payload: ActorPayload<'_>) -> BrokerResult<serde_json::Value> {
        let Some(token) = &self.api_token else {
            return Err(PlatformError::AuthRequired {
                platform: "rumble".to_string(),
                message: "no actor API token configured".to_string(),
            });
        };

        let session = self.http_router.acquire(ServiceType::Rumble).await;
        let breaker = self.resilience.get_or_create("rumble").await;
        let client = session.client.clone();
        let actor_id = self.actor_id.clone();
        let token = token.clone();
        let body = serde_json::to_value(&payload).unwrap_or_default();
        let timeout = self.actor_timeout;

        let result = with_retry(
            || {
                let client = client.clone();
                let actor_id = actor_id.clone();
                let token = token.clone();
                let body = body.clone();
                async move {
                    let run = tokio::time::timeout(
                        timeout,
                        client
                            .post(format!("https://api.apify.com/v2/acts/{actor_id}/run-sync-get-dataset-items"))
                            .bearer_auth(&token)
                            .json(&body)
                            .send(),
                    )
                    .await
                    .map_err(|_| TransportError::new(ErrorCategory::Timeout, "actor run timed out"))?
                    .map_err(|e| TransportError::from_reqwest(&e))?;

                    if !run.status().is_success() {
                        return Err(TransportError::new(ErrorCategory::from_status(run.status().as_u16()), run.status().to_string()));
                    }

                    run.json::<serde_json::Value>().await.map_err(|e| TransportError::from_reqwest(&e))
                }
            },
            &self.retry_policy,
            Some(&breaker),
        )
        .await;

        result.map_err(|exhausted| PlatformError::from_category(exhausted.last_error.category, "rumble", exhausted.last_error.message))
    }

    /// Quality-selectable stream extraction (§4.E.2). `extract_stream_url`
    /// (the uniform `Platform` contract) always asks for `Best`; callers who
    /// want a specific quality reach this through the Registry's downcast.
    pub async fn extract_stream_audio(&self, id: &str, quality: StreamQuality) -> BrokerResult<Option<StreamHandle>> {
        let quality_tag = match quality {
            StreamQuality::Best => "best",
            StreamQuality::Medium => "medium",
            StreamQuality::Low => "low",
        };
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::stream_url_with_cache(&cache, "rumble", id, quality_tag, Some(Duration::from_secs(30 * 60)), || async move {
            let url = format!("https://rumble.com/{id_owned}.html");
            let dataset = self
                .call_actor(ActorPayload { operation: "extract_audio", query: None, url: Some(&url), max_results: None })
                .await?;

            let mut streams: Vec<String> = dataset
                .as_array()
                .map(|a| a.iter().filter_map(|v| v["url"].as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            streams.sort();
            streams.reverse();

            let Some(chosen) = pick_by_quality(&streams, quality) else {
                return Ok(None);
            };

            Ok(Some(StreamHandle::expiring_in(chosen.to_string(), quality_tag, 30, Utc::now())))
        })
        .await
    }
}

fn parse_search_dataset(value: &serde_json::Value) -> Vec<VideoSummary> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(VideoSummary {
                        id: item["id"].as_str()?.to_string(),
                        title: item["title"].as_str().unwrap_or_default().to_string(),
                        channel: item["channel"].as_str().unwrap_or_default().to_string(),
                        thumbnail_url: item["thumbnail"].as_str().map(str::to_string),
                        canonical_url: item["url"].as_str().unwrap_or_default().to_string(),
                        platform_tag: "rumble".to_string(),
                        description: None,
                        duration_seconds: item["duration"].as_u64(),
                        views: item["views"].as_u64(),
                        instance: None,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Platform for RumblePlatform {
    fn name(&self) -> &str {
        "rumble"
    }

    async fn initialize(&self) -> BrokerResult<()> {
        Ok(())
    }

    async fn search(&self, query: &str, max: usize) -> BrokerResult<Vec<VideoSummary>> {
        let cache = self.cache.clone();
        let query_owned = query.to_string();
        cache_wrap::search_with_cache(&cache, "rumble", query, None, || async move {
            let dataset = self
                .call_actor(ActorPayload { operation: "search", query: Some(&query_owned), url: None, max_results: Some(max) })
                .await?;
            Ok(parse_search_dataset(&dataset))
        })
        .await
    }

    async fn get_details(&self, id: &str) -> BrokerResult<Option<VideoDetails>> {
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::details_with_cache(&cache, "rumble", id, Some(DEFAULT_METADATA_TTL), || async move {
            let url = format!("https://rumble.com/{id_owned}.html");
            let dataset = self.call_actor(ActorPayload { operation: "metadata", query: None, url: Some(&url), max_results: None }).await?;
            let item = dataset.as_array().and_then(|a| a.first());
            let Some(item) = item else {
                return Ok(None);
            };
            Ok(Some(VideoDetails {
                summary: VideoSummary {
                    id: id_owned.clone(),
                    title: item["title"].as_str().unwrap_or_default().to_string(),
                    channel: item["channel"].as_str().unwrap_or_default().to_string(),
                    thumbnail_url: item["thumbnail"].as_str().map(str::to_string),
                    canonical_url: url,
                    platform_tag: "rumble".to_string(),
                    description: item["description"].as_str().map(str::to_string),
                    duration_seconds: item["duration"].as_u64(),
                    views: item["views"].as_u64(),
                    instance: None,
                },
                likes: item["likes"].as_u64(),
                dislikes: item["dislikes"].as_u64(),
                published_at: None,
                available_qualities: vec![],
            }))
        })
        .await
    }

    async fn extract_stream_url(&self, id: &str) -> BrokerResult<Option<StreamHandle>> {
        self.extract_stream_audio(id, StreamQuality::Best).await
    }

    fn classify_url(&self, url: &str) -> Option<String> {
        url_patterns::classify_rumble(url)
    }

    async fn shutdown(&self) -> BrokerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_indices_match_spec() {
        let streams = vec!["1080p".to_string(), "720p".to_string(), "480p".to_string(), "360p".to_string()];
        assert_eq!(pick_by_quality(&streams, StreamQuality::Best), Some("1080p"));
        assert_eq!(pick_by_quality(&streams, StreamQuality::Medium), Some("480p"));
        assert_eq!(pick_by_quality(&streams, StreamQuality::Low), Some("360p"));
    }

    #[test]
    fn empty_stream_list_yields_none() {
        let streams: Vec<String> = vec![];
        assert_eq!(pick_by_quality(&streams, StreamQuality::Best), None);
    }
}
