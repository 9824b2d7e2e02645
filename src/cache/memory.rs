//! In-process `CachePort` implementation, used by default and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{metadata_key, search_key, stream_key, CacheMetrics, CachePort, DEFAULT_METADATA_TTL, DEFAULT_STREAM_TTL};
use crate::models::{StreamHandle, VideoDetails, VideoSummary};

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryCache {
    search: RwLock<HashMap<String, Entry<Vec<VideoSummary>>>>,
    metadata: RwLock<HashMap<String, Entry<VideoDetails>>>,
    streams: RwLock<HashMap<String, Entry<StreamHandle>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl CachePort for InMemoryCache {
    async fn get_search_results(&self, platform: &str, query: &str) -> Option<Vec<VideoSummary>> {
        let key = search_key(platform, query);
        let found = self.search.read().await.get(&key).filter(|e| e.expires_at > Instant::now()).map(|e| e.value.clone());
        self.record_lookup(found.is_some());
        found
    }

    async fn set_search_results(&self, platform: &str, query: &str, results: Vec<VideoSummary>, ttl: Option<Duration>) {
        if results.is_empty() {
            return;
        }
        let key = search_key(platform, query);
        let expires_at = Instant::now() + ttl.unwrap_or(DEFAULT_METADATA_TTL);
        self.search.write().await.insert(key, Entry { value: results, expires_at });
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    async fn get_video_metadata(&self, platform: &str, id: &str) -> Option<VideoDetails> {
        let key = metadata_key(platform, id);
        let found = self.metadata.read().await.get(&key).filter(|e| e.expires_at > Instant::now()).map(|e| e.value.clone());
        self.record_lookup(found.is_some());
        found
    }

    async fn set_video_metadata(&self, platform: &str, id: &str, details: VideoDetails, ttl: Option<Duration>) {
        let key = metadata_key(platform, id);
        let expires_at = Instant::now() + ttl.unwrap_or(DEFAULT_METADATA_TTL);
        self.metadata.write().await.insert(key, Entry { value: details, expires_at });
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    async fn get_stream_url(&self, platform: &str, id: &str, quality: &str) -> Option<StreamHandle> {
        let key = stream_key(platform, id, quality);
        let found = self.streams.read().await.get(&key).filter(|e| e.expires_at > Instant::now()).map(|e| e.value.clone());
        self.record_lookup(found.is_some());
        found
    }

    async fn set_stream_url(&self, platform: &str, id: &str, quality: &str, handle: StreamHandle, ttl: Option<Duration>) {
        let key = stream_key(platform, id, quality);
        let expires_at = Instant::now() + ttl.unwrap_or(DEFAULT_STREAM_TTL);
        self.streams.write().await.insert(key, Entry { value: handle, expires_at });
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    async fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_handle() -> StreamHandle {
        StreamHandle {
            direct_url: "https://example.com/stream".into(),
            quality_tag: "best".into(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = InMemoryCache::new();
        cache.set_stream_url("rumble", "v1", "best", sample_handle(), None).await;
        let got = cache.get_stream_url("rumble", "v1", "best").await;
        assert_eq!(got, Some(sample_handle()));
    }

    #[tokio::test]
    async fn empty_search_results_are_not_cached() {
        let cache = InMemoryCache::new();
        cache.set_search_results("rumble", "q", vec![], None).await;
        assert_eq!(cache.get_search_results("rumble", "q").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_misses() {
        let cache = InMemoryCache::new();
        cache
            .set_stream_url("rumble", "v1", "best", sample_handle(), Some(Duration::from_millis(1)))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get_stream_url("rumble", "v1", "best").await, None);
    }
}
