//! API-gated platform adapter (YouTube-shape), §4.E.1.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::cache::{CachePort, DEFAULT_METADATA_TTL};
use crate::errors::{BrokerResult, ErrorCategory, PlatformError, TransportError};
use crate::fallback::FallbackEngine;
use crate::http_router::HttpRouter;
use crate::models::{ServiceType, StreamHandle, VideoDetails, VideoSummary};
use crate::platform::{cache_wrap, url_patterns, Platform};
use crate::resilience::{with_retry, ResilienceManager, RetryPolicy};
use crate::sources::media_info::{select_best_format, MediaInfoExtractor};

pub struct YoutubePlatform {
    api_key: Option<String>,
    cookie_file: Option<String>,
    http_router: Arc<HttpRouter>,
    resilience: Arc<ResilienceManager>,
    cache: Arc<dyn CachePort>,
    fallback: Arc<FallbackEngine>,
    extractor: Arc<dyn MediaInfoExtractor>,
    retry_policy: RetryPolicy,
}

impl YoutubePlatform {
    pub fn new(
        api_key: Option<String>,
        cookie_file: Option<String>,
        http_router: Arc<HttpRouter>,
        resilience: Arc<ResilienceManager>,
        cache: Arc<dyn CachePort>,
        fallback: Arc<FallbackEngine>,
        extractor: Arc<dyn MediaInfoExtractor>,
    ) -> Self {
        Self {
            api_key,
            cookie_file,
            http_router,
            resilience,
            cache,
            fallback,
            extractor,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// §4.E.1: if given a URL, `search` returns exactly one hit (the video
    /// itself), bypassing the API entirely.
    async fn search_by_url(&self, url: &str, id: String) -> BrokerResult<Vec<VideoSummary>> {
        let info = self
            .extractor
            .extract(url, self.cookie_file.as_deref())
            .await
            .map_err(|e| PlatformError::from_category(ErrorCategory::Unknown, "youtube", e.to_string()))?;

        Ok(vec![VideoSummary {
            id,
            title: info.title,
            channel: info.channel,
            thumbnail_url: info.thumbnail_url,
            canonical_url: url.to_string(),
            platform_tag: "youtube".to_string(),
            description: None,
            duration_seconds: info.duration_seconds,
            views: None,
            instance: None,
        }])
    }

    async fn search_by_api(&self, query: &str, max: usize) -> BrokerResult<Vec<VideoSummary>> {
        let Some(api_key) = &self.api_key else {
            return Err(PlatformError::AuthRequired {
                platform: "youtube".to_string(),
                message: "no API key configured and query is not a direct URL".to_string(),
            });
        };

        let session = self.http_router.acquire(ServiceType::Youtube).await;
        let breaker = self.resilience.get_or_create("youtube").await;
        let api_key = api_key.clone();
        let query = query.to_string();
        let client = session.client.clone();

        let result = with_retry(
            || {
                let client = client.clone();
                let api_key = api_key.clone();
                let query = query.clone();
                async move {
                    let resp = client
                        .get("https://www.googleapis.com/youtube/v3/search")
                        .query(&[("part", "snippet"), ("q", &query), ("key", &api_key), ("type", "video")])
                        .send()
                        .await
                        .map_err(|e| TransportError::from_reqwest(&e))?;

                    if resp.status().as_u16() == 403 {
                        let body = resp.text().await.unwrap_or_default();
                        if body.contains("quotaExceeded") {
                            return Err(TransportError::new(ErrorCategory::RateLimit, "quotaExceeded"));
                        }
                        return Err(TransportError::new(ErrorCategory::Auth, body));
                    }
                    if !resp.status().is_success() {
                        return Err(TransportError::new(ErrorCategory::from_status(resp.status().as_u16()), resp.status().to_string()));
                    }

                    let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::from_reqwest(&e))?;
                    Ok(parse_search_response(&body, max))
                }
            },
            &self.retry_policy,
            Some(&breaker),
        )
        .await;

        match &result {
            Ok(_) => self.fallback.record_youtube_quota_usage(100, self.cookie_file.is_some()).await,
            Err(exhausted) if exhausted.last_error.category == ErrorCategory::RateLimit => {
                // Quota-exceeded errors trigger the Fallback Engine before re-raising (§4.E.1).
                self.fallback.note_youtube_quota_exceeded(self.cookie_file.is_some()).await;
            }
            Err(_) => {}
        }

        match result {
            Ok(summaries) => Ok(summaries),
            Err(exhausted) => Err(PlatformError::from_category(exhausted.last_error.category, "youtube", exhausted.last_error.message)),
        }
    }
}

fn parse_search_response(body: &serde_json::Value, max: usize) -> Vec<VideoSummary> {
    body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .take(max)
                .filter_map(|item| {
                    let id = item["id"]["videoId"].as_str()?.to_string();
                    let snippet = &item["snippet"];
                    Some(VideoSummary {
                        title: snippet["title"].as_str().unwrap_or_default().to_string(),
                        channel: snippet["channelTitle"].as_str().unwrap_or_default().to_string(),
                        thumbnail_url: snippet["thumbnails"]["default"]["url"].as_str().map(str::to_string),
                        canonical_url: format!("https://www.youtube.com/watch?v={id}"),
                        platform_tag: "youtube".to_string(),
                        description: snippet["description"].as_str().map(str::to_string),
                        duration_seconds: None,
                        views: None,
                        instance: None,
                        id,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Platform for YoutubePlatform {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn initialize(&self) -> BrokerResult<()> {
        Ok(())
    }

    async fn search(&self, query: &str, max: usize) -> BrokerResult<Vec<VideoSummary>> {
        if let Some(id) = url_patterns::classify_youtube(query) {
            // Direct URL bypass (§8 S1): no cache, no outbound API call.
            return self.search_by_url(query, id).await;
        }

        let cache = self.cache.clone();
        let query_owned = query.to_string();
        cache_wrap::search_with_cache(&cache, "youtube", query, None, || self.search_by_api(&query_owned, max)).await
    }

    async fn get_details(&self, id: &str) -> BrokerResult<Option<VideoDetails>> {
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::details_with_cache(&cache, "youtube", id, Some(DEFAULT_METADATA_TTL), || async move {
            let url = format!("https://www.youtube.com/watch?v={id_owned}");
            let info = self
                .extractor
                .extract(&url, self.cookie_file.as_deref())
                .await
                .map_err(|e| PlatformError::from_category(ErrorCategory::Unknown, "youtube", e.to_string()))?;
            Ok(Some(VideoDetails {
                summary: VideoSummary {
                    id: id_owned.clone(),
                    title: info.title,
                    channel: info.channel,
                    thumbnail_url: info.thumbnail_url,
                    canonical_url: url,
                    platform_tag: "youtube".to_string(),
                    description: None,
                    duration_seconds: info.duration_seconds,
                    views: None,
                    instance: None,
                },
                likes: None,
                dislikes: None,
                published_at: None,
                available_qualities: info.formats.iter().map(|f| f.format_tag.clone()).collect(),
            }))
        })
        .await
    }

    /// Always uses the local media-info extractor regardless of API key
    /// (§4.E.1). If cookies are available, converts them to Netscape
    /// format on first use and attaches the resulting file.
    async fn extract_stream_url(&self, id: &str) -> BrokerResult<Option<StreamHandle>> {
        let cache = self.cache.clone();
        let id_owned = id.to_string();
        cache_wrap::stream_url_with_cache(&cache, "youtube", id, "auto", Some(Duration::from_secs(30 * 60)), || async move {
            let url = format!("https://www.youtube.com/watch?v={id_owned}");
            let cookie_txt_path = self.cookie_file.as_deref().and_then(|json_path| {
                crate::sources::cookie::convert_to_netscape(std::path::Path::new(json_path)).ok()
            });
            let cookie_path_str = cookie_txt_path.as_ref().and_then(|p| p.to_str());

            let info = self
                .extractor
                .extract(&url, cookie_path_str)
                .await
                .map_err(|e| PlatformError::from_category(ErrorCategory::Unknown, "youtube", e.to_string()))?;

            let Some(best) = select_best_format(&info.formats) else {
                return Ok(None);
            };

            Ok(Some(StreamHandle::expiring_in(best.url.clone(), best.format_tag.clone(), 30, Utc::now())))
        })
        .await
    }

    fn classify_url(&self, url: &str) -> Option<String> {
        url_patterns::classify_youtube(url)
    }

    async fn shutdown(&self) -> BrokerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_search_response_maps_snippet_fields() {
        let body = serde_json::json!({
            "items": [
                {
                    "id": {"videoId": "abc123"},
                    "snippet": {
                        "title": "t",
                        "channelTitle": "c",
                        "description": "d",
                        "thumbnails": {"default": {"url": "https://img/x.jpg"}},
                    },
                },
                {"id": {"videoId": "def456"}, "snippet": {"title": "t2", "channelTitle": "c2"}},
            ]
        });

        let summaries = parse_search_response(&body, 10);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "abc123");
        assert_eq!(summaries[0].canonical_url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(summaries[0].thumbnail_url.as_deref(), Some("https://img/x.jpg"));
        assert_eq!(summaries[0].platform_tag, "youtube");
    }

    #[test]
    fn parse_search_response_respects_max() {
        let body = serde_json::json!({
            "items": [
                {"id": {"videoId": "a"}, "snippet": {"title": "t"}},
                {"id": {"videoId": "b"}, "snippet": {"title": "t"}},
                {"id": {"videoId": "c"}, "snippet": {"title": "t"}},
            ]
        });
        assert_eq!(parse_search_response(&body, 2).len(), 2);
    }

    #[test]
    fn parse_search_response_skips_items_without_video_id() {
        let body = serde_json::json!({ "items": [{"snippet": {"title": "no id"}}] });
        assert!(parse_search_response(&body, 10).is_empty());
    }

    #[test]
    fn parse_search_response_handles_missing_items_array() {
        let body = serde_json::json!({});
        assert!(parse_search_response(&body, 10).is_empty());
    }
}
