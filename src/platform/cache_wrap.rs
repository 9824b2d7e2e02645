//! Cache-wrap shared helper (§4.D): every public operation consults the
//! cache first and writes back on success.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CachePort;
use crate::models::{StreamHandle, VideoDetails, VideoSummary};

/// Runs `fetch` only on a cache miss, and writes the result back only if
/// `results` is non-empty (search has this rule explicitly in §4.D; the
/// other two accessors treat "found" as non-empty too since `None` is a
/// legitimate negative result that also shouldn't be cached).
pub async fn search_with_cache<F, Fut>(
    cache: &Arc<dyn CachePort>,
    platform: &str,
    query: &str,
    ttl: Option<Duration>,
    fetch: F,
) -> crate::errors::BrokerResult<Vec<VideoSummary>>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = crate::errors::BrokerResult<Vec<VideoSummary>>>,
{
    if let Some(cached) = cache.get_search_results(platform, query).await {
        return Ok(cached);
    }
    let results = fetch().await?;
    if !results.is_empty() {
        cache.set_search_results(platform, query, results.clone(), ttl).await;
    }
    Ok(results)
}

pub async fn details_with_cache<F, Fut>(
    cache: &Arc<dyn CachePort>,
    platform: &str,
    id: &str,
    ttl: Option<Duration>,
    fetch: F,
) -> crate::errors::BrokerResult<Option<VideoDetails>>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = crate::errors::BrokerResult<Option<VideoDetails>>>,
{
    if let Some(cached) = cache.get_video_metadata(platform, id).await {
        return Ok(Some(cached));
    }
    let details = fetch().await?;
    if let Some(ref d) = details {
        cache.set_video_metadata(platform, id, d.clone(), ttl).await;
    }
    Ok(details)
}

pub async fn stream_url_with_cache<F, Fut>(
    cache: &Arc<dyn CachePort>,
    platform: &str,
    id: &str,
    quality: &str,
    ttl: Option<Duration>,
    fetch: F,
) -> crate::errors::BrokerResult<Option<StreamHandle>>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = crate::errors::BrokerResult<Option<StreamHandle>>>,
{
    if let Some(cached) = cache.get_stream_url(platform, id, quality).await {
        return Ok(Some(cached));
    }
    let handle = fetch().await?;
    if let Some(ref h) = handle {
        cache.set_stream_url(platform, id, quality, h.clone(), ttl).await;
    }
    Ok(handle)
}
