//! Proprietary scraping platform adapter (Odysee-shape), §4.E.4.
//!
//! "Similar contract to 4.E.2 but against a different backend" (spec):
//! this adapter hits Odysee's public JSON-RPC-shaped API directly rather
//! than a paid actor runner, but shares the same cache-wrap / resilience /
//! retry wiring as the Rumble adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::cache::{CachePort, DEFAULT_METADATA_TTL};
use crate::errors::{BrokerResult, ErrorCategory, PlatformError, TransportError};
use crate::http_router::HttpRouter;
use crate::models::{ServiceType, StreamHandle, VideoDetails, VideoSummary};
use crate::platform::{cache_wrap, Platform};
use crate::resilience::{with_retry, ResilienceManager, RetryPolicy};

pub struct OdyseePlatform {
    http_router: Arc<HttpRouter>,
    resilience: Arc<ResilienceManager>,
    cache: Arc<dyn CachePort>,
    retry_policy: RetryPolicy,
    api_base: String,
}

impl OdyseePlatform {
    pub fn new(http_router: Arc<HttpRouter>, resilience: Arc<ResilienceManager>, cache: Arc<dyn CachePort>) -> Self {
        Self {
            http_router,
            resilience,
            cache,
            retry_policy: RetryPolicy::default(),
            api_base: "https://api.odysee.com".to_string(),
        }
    }

    async fn call(&self, path: &str, body: serde_json::Value) -> BrokerResult<serde_json::Value> {
        let session = self.http_router.acquire(ServiceType::Odysee).await;
        let breaker = self.resilience.get_or_create("odysee").await;
        let client = session.client.clone();
        let url = format!("{}{}", self.api_base, path);

        let result = with_retry(
            || {
                let client = client.clone();
                let url = url.clone();
                let body = body.clone();
                async move {
                    let resp = client.post(&url).json(&body).send().await.map_err(|e| TransportError::from_reqwest(&e))?;
                    if !resp.status().is_success() {
                        return Err(TransportError::new(ErrorCategory::from_status(resp.status().as_u16()), resp.status().to_string()));
                    }
                    resp.json::<serde_json::Value>().await.map_err(|e| TransportError::from_reqwest(&e))
                }
            },
            &self.retry_policy,
            Some(&breaker),
        )
        .await;

        result.map_err(|exhausted| PlatformError::from_category(exhausted.last_error.category, "odysee", exhausted.last_error.message))
    }
}

fn parse_claims(value: &serde_json::Value) -> Vec<VideoSummary> {
    value["result"]["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(VideoSummary {
                        id: item["claim_id"].as_str()?.to_string(),
                        title: item["value"]["title"].as_str().unwrap_or_default().to_string(),
                        channel: item["signing_channel"]["name"].as_str().unwrap_or_default().to_string(),
                        thumbnail_url: item["value"]["thumbnail"]["url"].as_str().map(str::to_string),
                        canonical_url: item["canonical_url"].as_str().unwrap_or_default().to_string(),
                        platform_tag: "odysee".to_string(),
                        description: item["value"]["description"].as_str().map(str::to_string),
                        duration_seconds: item["value"]["video"]["duration"].as_u64(),
                        views: None,
                        instance: None,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Platform for OdyseePlatform {
    fn name(&self) -> &str {
        "odysee"
    }

    async fn initialize(&self) -> BrokerResult<()> {
        Ok(())
    }

    async fn search(&self, query: &str, max: usize) -> BrokerResult<Vec<VideoSummary>> {
        let cache = self.cache.clone();
        let query_owned = query.to_string();
        cache_wrap::search_with_cache(&cache, "odysee", query, None, || async move {
            let body = serde_json::json!({ "method": "claim_search", "params": { "text": query_owned, "page_size": max } });
            let result = self.call("/api/v1/proxy", body).await?;
            Ok(parse_claims(&result))
        })
        .await
    }

    async fn get_details(&self, id: &str) -> BrokerResult<Option<VideoDetails>> {
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::details_with_cache(&cache, "odysee", id, Some(DEFAULT_METADATA_TTL), || async move {
            let body = serde_json::json!({ "method": "claim_search", "params": { "claim_ids": [id_owned] } });
            let result = self.call("/api/v1/proxy", body).await?;
            let summaries = parse_claims(&result);
            Ok(summaries.into_iter().next().map(|summary| VideoDetails {
                summary,
                likes: None,
                dislikes: None,
                published_at: None,
                available_qualities: vec![],
            }))
        })
        .await
    }

    async fn extract_stream_url(&self, id: &str) -> BrokerResult<Option<StreamHandle>> {
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::stream_url_with_cache(&cache, "odysee", id, "auto", Some(Duration::from_secs(30 * 60)), || async move {
            let body = serde_json::json!({ "method": "get", "params": { "claim_id": id_owned } });
            let result = self.call("/api/v1/proxy", body).await?;
            let Some(url) = result["result"]["streaming_url"].as_str() else {
                return Ok(None);
            };
            Ok(Some(StreamHandle::expiring_in(url.to_string(), "auto", 30, Utc::now())))
        })
        .await
    }

    fn classify_url(&self, url: &str) -> Option<String> {
        url.strip_prefix("https://odysee.com/").map(|tail| tail.trim_end_matches('/').to_string())
    }

    async fn shutdown(&self) -> BrokerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_claims_maps_claim_search_result_fields() {
        let value = serde_json::json!({
            "result": {
                "items": [
                    {
                        "claim_id": "abc123",
                        "canonical_url": "https://odysee.com/@chan:1/vid:2",
                        "signing_channel": {"name": "@chan"},
                        "value": {
                            "title": "t",
                            "description": "d",
                            "thumbnail": {"url": "https://img/x.png"},
                            "video": {"duration": 42},
                        },
                    },
                    {"value": {"title": "missing claim id"}},
                ]
            }
        });

        let summaries = parse_claims(&value);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "abc123");
        assert_eq!(summaries[0].channel, "@chan");
        assert_eq!(summaries[0].duration_seconds, Some(42));
        assert_eq!(summaries[0].platform_tag, "odysee");
    }

    #[test]
    fn parse_claims_handles_missing_items_array() {
        let value = serde_json::json!({ "result": {} });
        assert!(parse_claims(&value).is_empty());
    }

    #[test]
    fn classify_url_extracts_path_and_rejects_foreign_hosts() {
        let odysee = OdyseePlatform::new(
            Arc::new(crate::http_router::HttpRouter::new(crate::http_router::RoutingConfig::from_env())),
            Arc::new(crate::resilience::ResilienceManager::new(crate::resilience::CircuitBreakerConfig::default())),
            Arc::new(crate::cache::InMemoryCache::new()),
        );
        assert_eq!(odysee.classify_url("https://odysee.com/@chan:1/vid:2"), Some("@chan:1/vid:2".to_string()));
        assert_eq!(odysee.classify_url("https://youtube.com/watch?v=x"), None);
    }
}
